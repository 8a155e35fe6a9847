pub mod ins;
pub mod instrument_map;
pub mod midi;
pub mod opl3;
pub mod prf;
pub mod sequencer;
pub mod synth_driver;

pub mod prelude {
    pub use crate::ins::{InsData, InsOperator, InstrumentMode};
    pub use crate::instrument_map::Instrument;
    pub use crate::midi::MidiFile;
    pub use crate::opl3::Opl3Core;
    pub use crate::prf::PrfData;
    pub use crate::synth_driver::SynthDriver;
}

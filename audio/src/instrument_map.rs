//! Translate decoded `.INS` patches (enriched with the per-slot offsets a
//! `.PRF` profile supplies) into OPL3 register writes, plus the
//! legacy-AdLib octave-wrap correction needed when those patches are
//! carried onto OPL3's second 9-channel array.

use crate::ins::{InsData, InsOperator, InstrumentMode};
use crate::opl3::Opl3Core;

/// OPL2/3 operator-cell offsets for channels 0..9 within one register
/// array — the classic non-contiguous layout every OPL register block
/// uses (channel N's pair sits at `OPERATOR_OFFSETS[N]` and `+3`).
const OPERATOR_OFFSETS: [u8; 9] = [0, 1, 2, 8, 9, 10, 16, 17, 18];

fn operator_offset(channel: u8, is_carrier: bool) -> u8 {
    let base = OPERATOR_OFFSETS[(channel % 9) as usize];
    if is_carrier {
        base + 3
    } else {
        base
    }
}

/// One instrument as resolved for playback: the decoded `.INS` patch plus
/// the per-slot name, note/velocity offsets, and channel that the owning
/// `.PRF` profile supplies for that slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub name: String,
    pub mode: InstrumentMode,
    pub channel: u8,
    pub mod_wave: u8,
    pub car_wave: u8,
    pub modulator: InsOperator,
    pub carrier: InsOperator,
    pub note_offset: i16,
    pub velocity_offset: i16,
}

impl Instrument {
    /// Feedback and connection are carried on the modulator operator only
    /// — the carrier's own `feedback`/`connection` fields are unused.
    pub fn feedback(&self) -> u8 {
        self.modulator.feedback
    }

    pub fn additive(&self) -> bool {
        self.modulator.connection
    }

    /// `0` for a melodic voice; `1` for a fixed percussion voice. The INS
    /// mode byte only distinguishes the two — it does not identify which
    /// of the five rhythm-section voices a percussion patch is.
    pub fn rhythm_mode(&self) -> u8 {
        match self.mode {
            InstrumentMode::Melodic => 0,
            InstrumentMode::Percussion => 1,
        }
    }
}

/// Build an [`Instrument`] from a decoded `.INS` patch and the PRF-supplied
/// slot metadata.
pub fn build(name: impl Into<String>, ins: &InsData, note_offset: i16, velocity_offset: i16) -> Instrument {
    Instrument {
        name: name.into(),
        mode: ins.mode,
        channel: ins.channel,
        mod_wave: ins.mod_wave,
        car_wave: ins.car_wave,
        modulator: ins.modulator,
        carrier: ins.carrier,
        note_offset,
        velocity_offset,
    }
}

fn write_operator(core: &mut dyn Opl3Core, array: u8, channel: u8, is_carrier: bool, op: &InsOperator, wave: u8, level_scale: &dyn Fn(u8) -> u8) {
    let off = operator_offset(channel, is_carrier);
    let am = if op.am { 0x80 } else { 0 };
    let vib = if op.vibrato { 0x40 } else { 0 };
    let egt = if op.sustain_sound { 0x20 } else { 0 };
    let ksr = if op.ksr { 0x10 } else { 0 };
    core.write_reg(array, 0x20 + off, am | vib | egt | ksr | (op.freq_mult & 0x0F));
    core.write_reg(array, 0x40 + off, (op.key_scaling << 6) | level_scale(op.output_level & 0x3F));
    core.write_reg(array, 0x60 + off, (op.attack << 4) | (op.decay & 0x0F));
    core.write_reg(array, 0x80 + off, (op.sustain_level << 4) | (op.release & 0x0F));
    core.write_reg(array, 0xE0 + off, wave & 0x07);
}

/// Inject one instrument's operator pair and feedback/connection byte onto
/// `channel` within register `array`. Does not touch the key-on/frequency
/// registers — that's [`write_key_on`]'s job at note-on time.
///
/// `level_scale` is applied to each operator's `output_level` before it
/// reaches the total-level register — the hook `set_volume_model` uses to
/// make the OPL3 logarithmic/linear choice observable.
pub fn load_instrument(core: &mut dyn Opl3Core, array: u8, channel: u8, instrument: &Instrument, level_scale: &dyn Fn(u8) -> u8) {
    write_operator(core, array, channel, false, &instrument.modulator, instrument.mod_wave, level_scale);
    write_operator(core, array, channel, true, &instrument.carrier, instrument.car_wave, level_scale);
    let connection = if instrument.additive() { 0x01 } else { 0x00 };
    core.write_reg(array, 0xC0 + (channel % 9), (instrument.feedback() << 1) | connection);
}

/// Rewrite just the total-level (volume) registers for `instrument`'s
/// operators, passing each raw `output_level` through `transform` first —
/// the register-level expression of a MIDI CC7 channel-volume message
/// (`mute_channel`/`unmute_channel` send 0/127 through this).
pub fn write_channel_volume(core: &mut dyn Opl3Core, array: u8, channel: u8, instrument: &Instrument, transform: &dyn Fn(u8) -> u8) {
    let carrier_off = operator_offset(channel, true);
    core.write_reg(
        array,
        0x40 + carrier_off,
        (instrument.carrier.key_scaling << 6) | transform(instrument.carrier.output_level & 0x3F),
    );
    if instrument.additive() {
        let mod_off = operator_offset(channel, false);
        core.write_reg(
            array,
            0x40 + mod_off,
            (instrument.modulator.key_scaling << 6) | transform(instrument.modulator.output_level & 0x3F),
        );
    }
}

/// Legacy AdLib patches were authored against a 9-channel OPL2 layout.
/// Carried straight onto OPL3's second register array (channels 9..18),
/// the same block value lands one octave low — bump it by one, wrapping
/// at the 3-bit block field's range.
pub fn octave_wrap(block: u8, array: u8) -> u8 {
    if array == 1 {
        (block + 1) % 8
    } else {
        block
    }
}

/// Key-on register write (sets the key-on bit), applying [`octave_wrap`].
pub fn write_key_on(core: &mut dyn Opl3Core, array: u8, channel: u8, f_number: u16, block: u8) {
    let block = octave_wrap(block, array);
    let ch = channel % 9;
    core.write_reg(array, 0xA0 + ch, (f_number & 0xFF) as u8);
    let hi = ((f_number >> 8) & 0x03) as u8;
    core.write_reg(array, 0xB0 + ch, 0x20 | (block << 2) | hi);
}

/// Key-off register write (key-on bit cleared, frequency left in place so
/// the release stage still plays out at pitch).
pub fn write_key_off(core: &mut dyn Opl3Core, array: u8, channel: u8, f_number: u16, block: u8) {
    let block = octave_wrap(block, array);
    let ch = channel % 9;
    core.write_reg(array, 0xA0 + ch, (f_number & 0xFF) as u8);
    let hi = ((f_number >> 8) & 0x03) as u8;
    core.write_reg(array, 0xB0 + ch, (block << 2) | hi);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ins::InsData;

    fn identity(level: u8) -> u8 {
        level
    }

    fn flat_operator(feedback: u8, connection: bool) -> InsOperator {
        InsOperator {
            key_scaling: 1,
            freq_mult: 2,
            feedback,
            attack: 10,
            sustain_level: 4,
            sustain_sound: false,
            decay: 5,
            release: 8,
            output_level: 30,
            am: true,
            vibrato: false,
            ksr: false,
            connection,
        }
    }

    fn flat_instrument() -> Instrument {
        build(
            "TEST",
            &InsData {
                mode: InstrumentMode::Melodic,
                channel: 0,
                mod_wave: 1,
                car_wave: 0,
                modulator: flat_operator(5, true),
                carrier: flat_operator(0, false),
            },
            0,
            0,
        )
    }

    #[derive(Default)]
    struct RecordingCore {
        writes: Vec<(u8, u8, u8)>,
    }

    impl Opl3Core for RecordingCore {
        fn write_reg(&mut self, array: u8, register: u8, value: u8) {
            self.writes.push((array, register, value));
        }
        fn render(&mut self, out: &mut [i16]) {
            out.fill(0);
        }
    }

    #[test]
    fn load_instrument_sets_connection_bit_from_modulator() {
        let mut core = RecordingCore::default();
        load_instrument(&mut core, 0, 2, &flat_instrument(), &identity);
        let (_, reg, value) = *core.writes.last().unwrap();
        assert_eq!(reg, 0xC0 + 2);
        assert_eq!(value & 0x01, 1); // additive, from modulator.connection
        assert_eq!((value >> 1) & 0x07, 5); // feedback, from modulator.feedback
    }

    #[test]
    fn load_instrument_reads_wave_from_instrument_not_operator() {
        let mut core = RecordingCore::default();
        load_instrument(&mut core, 0, 0, &flat_instrument(), &identity);
        let mod_wave_write = core.writes.iter().find(|(_, reg, _)| *reg == 0xE0).unwrap();
        assert_eq!(mod_wave_write.2, 1);
        let car_wave_write = core.writes.iter().find(|(_, reg, _)| *reg == 0xE0 + 3).unwrap();
        assert_eq!(car_wave_write.2, 0);
    }

    #[test]
    fn write_channel_volume_touches_both_operators_when_additive() {
        let mut core = RecordingCore::default();
        let instrument = flat_instrument(); // modulator.connection == true (additive)
        write_channel_volume(&mut core, 0, 0, &instrument, &|_| 0x3F);
        assert_eq!(core.writes.len(), 2);
    }

    #[test]
    fn write_channel_volume_touches_only_carrier_when_fm() {
        let mut core = RecordingCore::default();
        let mut instrument = flat_instrument();
        instrument.modulator.connection = false;
        write_channel_volume(&mut core, 0, 0, &instrument, &|_| 0x3F);
        assert_eq!(core.writes.len(), 1);
    }

    #[test]
    fn octave_wrap_only_applies_to_second_array() {
        assert_eq!(octave_wrap(3, 0), 3);
        assert_eq!(octave_wrap(3, 1), 4);
        assert_eq!(octave_wrap(7, 1), 0); // wraps at the 3-bit field
    }

    #[test]
    fn key_on_sets_bit_5() {
        let mut core = RecordingCore::default();
        write_key_on(&mut core, 0, 0, 0x1FF, 4);
        let (_, _, value) = core.writes[1];
        assert_eq!(value & 0x20, 0x20);
    }
}

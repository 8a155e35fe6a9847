//! OPL3 register sink trait — the injection seam for an external FM
//! synthesis core.
//!
//! This crate never emulates OPL3 hardware itself (Non-goal): instead it
//! translates `.INS` patches and note events into register writes against
//! whatever chip core the host supplies, mirroring how the core crate's
//! `Bus`/`Cpu` traits let a host supply the hardware a format targets.

/// An external OPL3 core the synth driver writes register values into and
/// pulls rendered samples from.
pub trait Opl3Core {
    /// Write one byte to an OPL3 register. `array` selects bank 0 or 1
    /// (OPL3's second register array, giving 18 two-operator channels).
    fn write_reg(&mut self, array: u8, register: u8, value: u8);

    /// Render `out.len()` interleaved stereo samples (or mono, at the
    /// core's discretion) into `out`.
    fn render(&mut self, out: &mut [i16]);
}

/// An [`Opl3Core`] that drops every register write and renders silence —
/// used when no audio backend is configured (host audio
/// output is out of scope for this core).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOpl3Core;

impl Opl3Core for NullOpl3Core {
    fn write_reg(&mut self, _array: u8, _register: u8, _value: u8) {}

    fn render(&mut self, out: &mut [i16]) {
        out.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_core_renders_silence() {
        let mut core = NullOpl3Core;
        let mut buf = [1i16; 8];
        core.render(&mut buf);
        assert_eq!(buf, [0i16; 8]);
    }
}

//! INS Parser. A single fixed 80-byte AdLib/OPL2 two-operator
//! instrument patch — not a bank: one `.INS` file is one patch.

use flashback_core::error::{DecodeError, DecodeReason};
use flashback_core::io::Reader;

pub const RECORD_LEN: usize = 80;

const OFF_MODE: usize = 0;
const OFF_CHANNEL: usize = 1;
const OFF_MODULATOR: usize = 2;
const OFF_CARRIER: usize = 28;
const OFF_MOD_WAVE: usize = 74;
const OFF_CAR_WAVE: usize = 76;

/// One FM operator's thirteen fields, each stored as its own little-endian
/// `u16` in the patch and masked down to its documented width here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsOperator {
    pub key_scaling: u8,
    pub freq_mult: u8,
    pub feedback: u8,
    pub attack: u8,
    pub sustain_level: u8,
    pub sustain_sound: bool,
    pub decay: u8,
    pub release: u8,
    pub output_level: u8,
    pub am: bool,
    pub vibrato: bool,
    pub ksr: bool,
    pub connection: bool,
}

fn decode_operator(r: &mut Reader<'_>) -> Result<InsOperator, DecodeError> {
    let key_scaling = r.u16_le()?;
    let freq_mult = r.u16_le()?;
    let feedback = r.u16_le()?;
    let attack = r.u16_le()?;
    let sustain_level = r.u16_le()?;
    let sustain_sound = r.u16_le()?;
    let decay = r.u16_le()?;
    let release = r.u16_le()?;
    let output_level = r.u16_le()?;
    let am = r.u16_le()?;
    let vibrato = r.u16_le()?;
    let ksr = r.u16_le()?;
    let connection = r.u16_le()?;

    Ok(InsOperator {
        key_scaling: (key_scaling & 0x03) as u8,
        freq_mult: (freq_mult & 0x0F) as u8,
        feedback: (feedback & 0x07) as u8,
        attack: (attack & 0x0F) as u8,
        sustain_level: (sustain_level & 0x0F) as u8,
        sustain_sound: sustain_sound != 0,
        decay: (decay & 0x0F) as u8,
        release: (release & 0x0F) as u8,
        output_level: (output_level & 0x3F) as u8,
        am: am != 0,
        vibrato: vibrato != 0,
        ksr: ksr != 0,
        connection: connection != 0,
    })
}

/// Whether an instrument plays on a melodic channel or a fixed percussion
/// voice (mode byte: `0` melodic, `1` percussion).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentMode {
    Melodic,
    Percussion,
}

/// One decoded `.INS` instrument patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsData {
    pub mode: InstrumentMode,
    pub channel: u8,
    pub mod_wave: u8,
    pub car_wave: u8,
    pub modulator: InsOperator,
    pub carrier: InsOperator,
}

/// Parse a `.INS` asset: the fixed 80-byte patch documented at each
/// field's byte offset. Waveform selects live at bytes 74/76, never
/// inside the operator blocks themselves — reading them from bytes 2-3
/// instead is a silent, disastrous timbre error.
pub fn parse(data: &[u8]) -> Result<InsData, DecodeError> {
    if data.len() < RECORD_LEN {
        return Err(DecodeError::invalid(DecodeReason::FileTooSmall {
            expected_at_least: RECORD_LEN,
            actual: data.len(),
        }));
    }

    let mode_byte = Reader::at(data, OFF_MODE).u8()?;
    let mode = match mode_byte {
        0 => InstrumentMode::Melodic,
        1 => InstrumentMode::Percussion,
        other => return Err(DecodeError::invalid(DecodeReason::BadInstrumentMode(other))),
    };
    let channel = Reader::at(data, OFF_CHANNEL).u8()?;

    let mut r = Reader::at(data, OFF_MODULATOR);
    let modulator = decode_operator(&mut r)?;
    let mut r = Reader::at(data, OFF_CARRIER);
    let carrier = decode_operator(&mut r)?;

    let mod_wave = Reader::at(data, OFF_MOD_WAVE).u8()? & 0x07;
    let car_wave = Reader::at(data, OFF_CAR_WAVE).u8()? & 0x07;

    Ok(InsData {
        mode,
        channel,
        mod_wave,
        car_wave,
        modulator,
        carrier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_record(mode: u8) -> [u8; RECORD_LEN] {
        let mut rec = [0u8; RECORD_LEN];
        rec[OFF_MODE] = mode;
        rec[OFF_CHANNEL] = 5;

        let mut put_u16 = |off: usize, v: u16| {
            rec[off..off + 2].copy_from_slice(&v.to_le_bytes());
        };
        // modulator: key_scaling, freq_mult, feedback, attack,
        // sustain_level, sustain_sound, decay, release, output_level,
        // am, vibrato, ksr, connection.
        put_u16(OFF_MODULATOR, 1); // key_scaling
        put_u16(OFF_MODULATOR + 2, 7); // freq_mult
        put_u16(OFF_MODULATOR + 4, 3); // feedback
        put_u16(OFF_MODULATOR + 6, 15); // attack
        put_u16(OFF_MODULATOR + 8, 9); // sustain_level
        put_u16(OFF_MODULATOR + 10, 1); // sustain_sound
        put_u16(OFF_MODULATOR + 12, 4); // decay
        put_u16(OFF_MODULATOR + 14, 2); // release
        put_u16(OFF_MODULATOR + 16, 63); // output_level
        put_u16(OFF_MODULATOR + 18, 1); // am
        put_u16(OFF_MODULATOR + 20, 0); // vibrato
        put_u16(OFF_MODULATOR + 22, 1); // ksr
        put_u16(OFF_MODULATOR + 24, 0); // connection

        rec[OFF_MOD_WAVE] = 3;
        rec[OFF_CAR_WAVE] = 5;
        rec
    }

    #[test]
    fn decodes_melodic_mode_and_channel() {
        let rec = synthetic_record(0);
        let ins = parse(&rec).unwrap();
        assert_eq!(ins.mode, InstrumentMode::Melodic);
        assert_eq!(ins.channel, 5);
    }

    #[test]
    fn decodes_modulator_operator_fields() {
        let rec = synthetic_record(0);
        let ins = parse(&rec).unwrap();
        assert_eq!(ins.modulator.freq_mult, 7);
        assert_eq!(ins.modulator.feedback, 3);
        assert_eq!(ins.modulator.attack, 15);
        assert_eq!(ins.modulator.sustain_level, 9);
        assert!(ins.modulator.sustain_sound);
        assert_eq!(ins.modulator.decay, 4);
        assert_eq!(ins.modulator.release, 2);
        assert_eq!(ins.modulator.output_level, 63);
        assert!(ins.modulator.am);
        assert!(!ins.modulator.vibrato);
        assert!(ins.modulator.ksr);
    }

    #[test]
    fn reads_wave_selects_from_bytes_74_and_76_not_the_operator_block() {
        let rec = synthetic_record(0);
        let ins = parse(&rec).unwrap();
        assert_eq!(ins.mod_wave, 3);
        assert_eq!(ins.car_wave, 5);
    }

    #[test]
    fn percussion_mode_decodes() {
        let rec = synthetic_record(1);
        let ins = parse(&rec).unwrap();
        assert_eq!(ins.mode, InstrumentMode::Percussion);
    }

    #[test]
    fn bad_mode_byte_rejected() {
        let rec = synthetic_record(2);
        assert!(matches!(
            parse(&rec),
            Err(DecodeError::InvalidFormat(DecodeReason::BadInstrumentMode(2)))
        ));
    }

    #[test]
    fn truncated_file_rejected() {
        assert!(parse(&[0u8; 10]).is_err());
    }
}

//! PRF Parser. A fixed-offset, 753-byte little-endian record describing
//! one cutscene's instrument-to-slot mapping and timing.

use flashback_core::error::DecodeError;
use flashback_core::io::Reader;

const INSTRUMENT_NAME_LEN: usize = 30;
const SLOT_COUNT: usize = 16;

const OFF_INSTRUMENTS: usize = 0;
const OFF_ADLIB_NOTES: usize = 480;
const OFF_ADLIB_VELOCITIES: usize = 512;
const OFF_TIMER_TICKS: usize = 544;
const OFF_TIMER_MOD: usize = 548;
const OFF_MIDI_FILENAME: usize = 550;
const MIDI_FILENAME_LEN: usize = 20;
const OFF_ADLIB_DO_NOTES_LOOKUP: usize = 570;
const OFF_ADLIB_PROGRAMS: usize = 572;
const OFF_HW_CHANNEL_NUM: usize = 700;
const OFF_LOOP_FLAG: usize = 732;
const OFF_TOTAL_DURATION_TICKS: usize = 748;

/// The decoded `.PRF` profile record: per-slot instrument assignment plus
/// cutscene-wide timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrfData {
    pub instruments: [Option<String>; SLOT_COUNT],
    pub adlib_notes: [i16; SLOT_COUNT],
    pub adlib_velocities: [i16; SLOT_COUNT],
    pub timer_ticks: u32,
    pub timer_mod: u16,
    pub midi_filename: String,
    pub adlib_do_notes_lookup: u16,
    pub adlib_programs: [u16; SLOT_COUNT],
    pub hw_channel_num: [u8; SLOT_COUNT],
    pub loop_flag: [u8; SLOT_COUNT],
    pub total_duration_ticks: u32,
}

impl PrfData {
    pub fn note_offset(&self, slot: usize) -> Option<i16> {
        self.adlib_notes.get(slot).copied()
    }

    pub fn velocity_offset(&self, slot: usize) -> Option<i16> {
        self.adlib_velocities.get(slot).copied()
    }
}

/// Parse a `.PRF` asset: the fixed 753-byte record documented at each
/// field's byte offset, little-endian throughout.
pub fn parse(data: &[u8]) -> Result<PrfData, DecodeError> {
    let mut instruments: [Option<String>; SLOT_COUNT] = Default::default();
    for (slot, name) in instruments.iter_mut().enumerate() {
        let mut r = Reader::at(data, OFF_INSTRUMENTS + slot * INSTRUMENT_NAME_LEN);
        let s = r.fixed_str(INSTRUMENT_NAME_LEN)?;
        *name = if s.is_empty() { None } else { Some(s) };
    }

    let mut adlib_notes = [0i16; SLOT_COUNT];
    let mut r = Reader::at(data, OFF_ADLIB_NOTES);
    for slot in adlib_notes.iter_mut() {
        *slot = r.i16_le()?;
    }

    let mut adlib_velocities = [0i16; SLOT_COUNT];
    let mut r = Reader::at(data, OFF_ADLIB_VELOCITIES);
    for slot in adlib_velocities.iter_mut() {
        *slot = r.i16_le()?;
    }

    let timer_ticks = Reader::at(data, OFF_TIMER_TICKS).u32_le()?;
    let timer_mod = Reader::at(data, OFF_TIMER_MOD).u16_le()?;
    let midi_filename = Reader::at(data, OFF_MIDI_FILENAME).fixed_str(MIDI_FILENAME_LEN)?;
    let adlib_do_notes_lookup = Reader::at(data, OFF_ADLIB_DO_NOTES_LOOKUP).u16_le()?;

    let mut adlib_programs = [0u16; SLOT_COUNT];
    let mut r = Reader::at(data, OFF_ADLIB_PROGRAMS);
    for slot in adlib_programs.iter_mut() {
        *slot = r.u16_le()?;
    }

    let mut hw_channel_num = [0u8; SLOT_COUNT];
    let mut r = Reader::at(data, OFF_HW_CHANNEL_NUM);
    for slot in hw_channel_num.iter_mut() {
        *slot = r.u8()?;
    }

    let mut loop_flag = [0u8; SLOT_COUNT];
    let mut r = Reader::at(data, OFF_LOOP_FLAG);
    for slot in loop_flag.iter_mut() {
        *slot = r.u8()?;
    }

    let total_duration_ticks = Reader::at(data, OFF_TOTAL_DURATION_TICKS).u32_le()?;

    Ok(PrfData {
        instruments,
        adlib_notes,
        adlib_velocities,
        timer_ticks,
        timer_mod,
        midi_filename,
        adlib_do_notes_lookup,
        adlib_programs,
        hw_channel_num,
        loop_flag,
        total_duration_ticks,
    })
}

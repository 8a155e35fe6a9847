//! Standard MIDI File reader. `.MID` (SMF type-0 or type-1) is
//! the format the underlying OPL3 synth consumes. This crate has no use for
//! a General MIDI control surface, only the note-on/note-off event stream
//! and its timing, so this reads exactly that: chunk headers, variable-
//! length quantities, running status, and the Set Tempo meta event. Every
//! other meta/sysex/control event is skipped by length, never interpreted.

use flashback_core::error::{DecodeError, DecodeReason};
use flashback_core::io::Reader;

/// A channel-voice event worth acting on. Control changes, program changes,
/// and anything else relevant only to a full GM synth are dropped at parse
/// time — this core drives its own PRF/INS instrument mapping instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    /// A recognised but uninterpreted event (control change, program
    /// change, pitch bend, ...). Carried so tick counts stay correct even
    /// though the payload is discarded.
    Other,
    /// A Set Tempo meta event (FF 51 03), microseconds per quarter note.
    SetTempo(u32),
    EndOfTrack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackEvent {
    pub delta_ticks: u32,
    pub event: MidiEvent,
}

/// A parsed SMF: one shared `division` (ticks per quarter note) and one
/// event list per track, in file order. Type-0 files parse to a single
/// track; type-1 files to several, by convention track 0 carrying only
/// tempo/meta events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiFile {
    pub division: u16,
    pub tracks: Vec<Vec<TrackEvent>>,
}

fn read_vlq(r: &mut Reader<'_>) -> Result<u32, DecodeError> {
    let mut value: u32 = 0;
    for _ in 0..4 {
        let byte = r.u8()?;
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(DecodeError::invalid(DecodeReason::BadMidiChunk))
}

fn read_chunk_header(r: &mut Reader<'_>) -> Result<([u8; 4], u32), DecodeError> {
    let tag_bytes = r.bytes(4)?;
    let mut tag = [0u8; 4];
    tag.copy_from_slice(tag_bytes);
    let len = r.u32_be()?;
    Ok((tag, len))
}

fn parse_track(r: &mut Reader<'_>, len: u32) -> Result<Vec<TrackEvent>, DecodeError> {
    let end = r.position() + len as usize;
    let mut events = Vec::new();
    let mut running_status: Option<u8> = None;

    while r.position() < end {
        let delta_ticks = read_vlq(r)?;
        let mut status = r.u8()?;
        if status < 0x80 {
            // Running status: this byte is actually the first data byte.
            let Some(prev) = running_status else {
                return Err(DecodeError::invalid(DecodeReason::BadMidiChunk));
            };
            r.seek(r.position() - 1);
            status = prev;
        } else {
            running_status = Some(status);
        }

        let event = match status {
            0x80..=0x8F => {
                let channel = status & 0x0F;
                let note = r.u8()?;
                let _velocity = r.u8()?;
                MidiEvent::NoteOff { channel, note }
            }
            0x90..=0x9F => {
                let channel = status & 0x0F;
                let note = r.u8()?;
                let velocity = r.u8()?;
                if velocity == 0 {
                    MidiEvent::NoteOff { channel, note }
                } else {
                    MidiEvent::NoteOn { channel, note, velocity }
                }
            }
            0xA0..=0xAF | 0xB0..=0xBF | 0xE0..=0xEF => {
                r.skip(2)?;
                MidiEvent::Other
            }
            0xC0..=0xCF | 0xD0..=0xDF => {
                r.skip(1)?;
                MidiEvent::Other
            }
            0xF0 | 0xF7 => {
                let sysex_len = read_vlq(r)?;
                r.skip(sysex_len as usize)?;
                MidiEvent::Other
            }
            0xFF => {
                let meta_type = r.u8()?;
                let meta_len = read_vlq(r)?;
                match meta_type {
                    0x51 if meta_len == 3 => {
                        let bytes = r.bytes(3)?;
                        let tempo = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
                        MidiEvent::SetTempo(tempo)
                    }
                    0x2F => {
                        r.skip(meta_len as usize)?;
                        MidiEvent::EndOfTrack
                    }
                    _ => {
                        r.skip(meta_len as usize)?;
                        MidiEvent::Other
                    }
                }
            }
            _ => return Err(DecodeError::invalid(DecodeReason::BadMidiChunk)),
        };

        events.push(TrackEvent { delta_ticks, event });
    }

    Ok(events)
}

/// Parse a standard MIDI file (type-0 or type-1; type-2 is rejected since
/// no Flashback-style cutscene audio needs independent, non-simultaneous
/// patterns).
pub fn parse(data: &[u8]) -> Result<MidiFile, DecodeError> {
    let mut r = Reader::new(data);
    let (tag, header_len) = read_chunk_header(&mut r)?;
    if &tag != b"MThd" || header_len < 6 {
        return Err(DecodeError::invalid(DecodeReason::BadMidiChunk));
    }
    let format = r.u16_be()?;
    if format == 2 {
        return Err(DecodeError::invalid(DecodeReason::BadMidiChunk));
    }
    let track_count = r.u16_be()?;
    let division = r.u16_be()?;
    r.skip(header_len as usize - 6)?;

    let mut tracks = Vec::with_capacity(track_count as usize);
    for _ in 0..track_count {
        let (tag, len) = read_chunk_header(&mut r)?;
        if &tag != b"MTrk" {
            return Err(DecodeError::invalid(DecodeReason::BadMidiChunk));
        }
        tracks.push(parse_track(&mut r, len)?);
    }

    Ok(MidiFile { division, tracks })
}

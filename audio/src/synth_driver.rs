//! Drives an [`Opl3Core`] from a loaded instrument bank and (optionally) a
//! sequenced `.MID` file. Callers can also drive note events directly —
//! `load_midi`/`play`/`render_samples` are one way to produce them, not the
//! only way.

use flashback_core::error::DecodeError;

use crate::instrument_map::{self, write_key_off, write_key_on, Instrument};
use crate::midi::{self, MidiEvent};
use crate::opl3::Opl3Core;
use crate::sequencer::Sequencer;

const NUM_CHANNELS: usize = 18;

fn note_to_fnum_block(note: u8) -> (u16, u8) {
    let freq = 440.0_f64 * 2f64.powf((note as f64 - 69.0) / 12.0);
    let block = (((note as i32 - 24) / 12).clamp(0, 7)) as u8;
    let f_number = (freq * (1u32 << (20 - block as u32)) as f64 / 49716.0).round();
    (f_number.clamp(0.0, 1023.0) as u16, block)
}

/// Which output-level curve `set_volume_model` selects. The native model
/// writes an INS patch's `output_level` straight to the total-level
/// register — OPL3's own attenuation curve is already logarithmic. Any
/// other model number approximates a linear-perceived curve instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VolumeModel {
    NativeLogarithmic,
    Linear,
}

impl VolumeModel {
    fn from_u8(n: u8) -> Self {
        if n == 0 {
            VolumeModel::NativeLogarithmic
        } else {
            VolumeModel::Linear
        }
    }

    fn scale(self, level: u8) -> u8 {
        match self {
            VolumeModel::NativeLogarithmic => level,
            VolumeModel::Linear => (level as f64 * 0.75).round() as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    muted: bool,
    active_note: Option<(u16, u8)>,
    /// User-tunable semitone bias applied on top of the note at note-on
    /// time. Distinct from `instrument_map::octave_wrap`, which is an
    /// automatic hardware-layout correction rather than a user control.
    octave_offset: i8,
    /// When set, overrides the bank lookup for this channel.
    instrument_override: Option<usize>,
}

/// Owns the injected chip core plus the loaded instrument bank (one slot
/// per channel, as resolved from a `.PRF` profile's per-slot instrument
/// names and note/velocity offsets), and turns note events into register
/// writes on the right channel.
pub struct SynthDriver<C: Opl3Core> {
    core: C,
    bank: Vec<Option<Instrument>>,
    channels: [ChannelState; NUM_CHANNELS],
    sequencer: Option<Sequencer>,
    playing: bool,
    sample_rate: u32,
    volume_model: VolumeModel,
    deep_vibrato_tremolo: bool,
}

impl<C: Opl3Core> SynthDriver<C> {
    pub fn new(core: C) -> Self {
        SynthDriver {
            core,
            bank: Vec::new(),
            channels: [ChannelState::default(); NUM_CHANNELS],
            sequencer: None,
            playing: false,
            sample_rate: 49_716,
            volume_model: VolumeModel::NativeLogarithmic,
            deep_vibrato_tremolo: false,
        }
    }

    /// Create the underlying synth state, select the native OPL3
    /// logarithmic volume model, and disable deep vibrato/tremolo — the
    /// startup sequence every cutscene's audio load performs before the
    /// first instrument is installed.
    pub fn init(&mut self) {
        self.volume_model = VolumeModel::NativeLogarithmic;
        self.deep_vibrato_tremolo = false;
        self.core.write_reg(0, 0x01, 0x20); // enable waveform select
        self.core.write_reg(1, 0x05, 0x01); // enable OPL3 mode on the second array
        self.core.write_reg(0, 0xBD, 0x00); // deep tremolo/vibrato off, rhythm mode off
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate.max(1);
    }

    /// Install `instrument` at `slot`, overwriting whatever was there.
    pub fn set_instrument(&mut self, slot: usize, instrument: Instrument) {
        if self.bank.len() <= slot {
            self.bank.resize(slot + 1, None);
        }
        self.bank[slot] = Some(instrument);
    }

    pub fn bank(&self) -> &[Option<Instrument>] {
        &self.bank
    }

    fn array_and_local(channel: usize) -> (u8, u8) {
        if channel >= 9 {
            (1, (channel - 9) as u8)
        } else {
            (0, channel as u8)
        }
    }

    fn instrument_for_channel(&self, channel: usize) -> Option<&Instrument> {
        if let Some(idx) = self.channels.get(channel).and_then(|c| c.instrument_override) {
            return self.bank.get(idx).and_then(Option::as_ref);
        }
        self.bank.get(channel).and_then(Option::as_ref)
    }

    pub fn instrument_name_for_channel(&self, channel: usize) -> Option<&str> {
        self.instrument_for_channel(channel).map(|ins| ins.name.as_str())
    }

    /// Find `name` in the loaded bank and override `channel`'s slot
    /// lookup to use it. Returns `false` (leaving the previous mapping in
    /// place) if no instrument with that name is loaded.
    pub fn set_channel_instrument(&mut self, channel: usize, name: &str) -> bool {
        let Some(idx) = self.bank.iter().position(|slot| slot.as_ref().is_some_and(|ins| ins.name == name)) else {
            return false;
        };
        if let Some(state) = self.channels.get_mut(channel) {
            state.instrument_override = Some(idx);
            true
        } else {
            false
        }
    }

    pub fn set_channel_octave_offset(&mut self, channel: usize, delta: i8) {
        if let Some(state) = self.channels.get_mut(channel) {
            state.octave_offset = delta;
        }
    }

    pub fn channel_octave_offset(&self, channel: usize) -> i8 {
        self.channels.get(channel).map(|c| c.octave_offset).unwrap_or(0)
    }

    /// Start `note` on `channel`, loading that channel's instrument from the
    /// bank (or override) first and applying the instrument's PRF-supplied
    /// `note_offset`. A no-op if the channel is muted or has no instrument
    /// mapped.
    pub fn note_on(&mut self, channel: usize, note: u8) {
        if channel >= NUM_CHANNELS {
            return;
        }
        if self.channels[channel].muted {
            return;
        }
        let Some(instrument) = self.instrument_for_channel(channel) else {
            #[cfg(feature = "logging")]
            tracing::warn!("no instrument mapped for channel {channel}, skipping note-on for {note}");
            return;
        };
        let instrument = instrument.clone();
        let (array, local) = Self::array_and_local(channel);
        let volume_model = self.volume_model;
        instrument_map::load_instrument(&mut self.core, array, local, &instrument, &move |level| volume_model.scale(level));
        let offset_semitones = self.channels[channel].octave_offset as i32 * 12;
        let note = (note as i32 + instrument.note_offset as i32 + offset_semitones).clamp(0, 127) as u8;
        let (f_number, block) = note_to_fnum_block(note);
        write_key_on(&mut self.core, array, local, f_number, block);
        self.channels[channel].active_note = Some((f_number, block));
    }

    /// Release whatever note is currently sounding on `channel`, if any.
    pub fn note_off(&mut self, channel: usize) {
        if channel >= NUM_CHANNELS {
            return;
        }
        if let Some((f_number, block)) = self.channels[channel].active_note.take() {
            let (array, local) = Self::array_and_local(channel);
            write_key_off(&mut self.core, array, local, f_number, block);
        }
    }

    /// Mute or unmute `channel` the way a MIDI CC7 (channel volume) message
    /// would: `value == 0` mutes, `value == 127` restores full volume.
    /// Any active note is released on mute so it doesn't keep sounding
    /// through its release stage at full level.
    fn send_channel_volume(&mut self, channel: usize, value: u8) {
        if channel >= NUM_CHANNELS {
            return;
        }
        self.channels[channel].muted = value == 0;
        if value == 0 {
            self.note_off(channel);
        }
        let Some(instrument) = self.instrument_for_channel(channel).cloned() else {
            return;
        };
        let (array, local) = Self::array_and_local(channel);
        let volume_model = self.volume_model;
        let attenuation_bonus = ((127 - value as u16) * 0x3F / 127) as u8;
        instrument_map::write_channel_volume(&mut self.core, array, local, &instrument, &move |level| {
            volume_model.scale(level).saturating_add(attenuation_bonus).min(0x3F)
        });
    }

    pub fn mute_channel(&mut self, channel: usize) {
        self.send_channel_volume(channel, 0);
    }

    pub fn unmute_channel(&mut self, channel: usize) {
        self.send_channel_volume(channel, 127);
    }

    /// Kept for callers that want to set mute state without going through
    /// the CC7 framing directly.
    pub fn set_muted(&mut self, channel: usize, muted: bool) {
        if muted {
            self.mute_channel(channel);
        } else {
            self.unmute_channel(channel);
        }
    }

    pub fn is_muted(&self, channel: usize) -> bool {
        self.channels.get(channel).is_some_and(|c| c.muted)
    }

    /// Release every sounding channel.
    pub fn all_notes_off(&mut self) {
        for channel in 0..NUM_CHANNELS {
            self.note_off(channel);
        }
    }

    /// Select the output-level curve: `0` is the native OPL3 logarithmic
    /// curve (an INS patch's `output_level` written straight to the
    /// total-level register); any other value approximates a linear
    /// perceived-volume curve instead. Affects subsequent `note_on` and
    /// mute/unmute register writes, not already-sounding notes.
    pub fn set_volume_model(&mut self, n: u8) {
        self.volume_model = VolumeModel::from_u8(n);
    }

    pub fn volume_model(&self) -> u8 {
        match self.volume_model {
            VolumeModel::NativeLogarithmic => 0,
            VolumeModel::Linear => 1,
        }
    }

    /// Parse and install a `.MID` score. Does not start playback — call
    /// [`Self::play`] to begin advancing it during [`Self::render_samples`].
    pub fn load_midi(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let file = midi::parse(data)?;
        self.sequencer = Some(Sequencer::new(&file));
        self.playing = false;
        Ok(())
    }

    pub fn play(&mut self) {
        if self.sequencer.is_some() {
            self.playing = true;
        }
    }

    /// Stop playback, release every sounding channel, and rewind the
    /// sequencer so a subsequent `play()` starts from the top.
    pub fn stop_and_reset(&mut self) {
        self.playing = false;
        self.all_notes_off();
        if let Some(seq) = &mut self.sequencer {
            seq.rewind();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Seek the loaded score to `seconds` from the start: rewind, release
    /// every sounding note, then fast-forward the sequencer, firing
    /// whatever note events fall within `[0, seconds)` so the instrument
    /// state matches what continuous playback would have produced.
    pub fn seek(&mut self, seconds: f64) {
        self.all_notes_off();
        let Some(mut seq) = self.sequencer.take() else {
            return;
        };
        seq.rewind();
        let mut due = Vec::new();
        seq.advance((seconds.max(0.0)) * 1_000_000.0, |event| due.push(event));
        for event in due {
            match event {
                MidiEvent::NoteOn { channel, note, .. } => self.note_on(channel as usize, note),
                MidiEvent::NoteOff { channel, note: _ } => self.note_off(channel as usize),
                _ => {}
            }
        }
        self.sequencer = Some(seq);
    }

    /// Render `out.len()` samples, advancing the loaded sequencer (if
    /// playing) by however much wall-clock time that many samples spans at
    /// the configured sample rate, firing due note events first.
    pub fn render_samples(&mut self, out: &mut [i16]) {
        if self.playing {
            let elapsed_us = out.len() as f64 / self.sample_rate as f64 * 1_000_000.0;
            if let Some(mut seq) = self.sequencer.take() {
                let mut due = Vec::new();
                seq.advance(elapsed_us, |event| due.push(event));
                for event in due {
                    match event {
                        MidiEvent::NoteOn { channel, note, .. } => self.note_on(channel as usize, note),
                        MidiEvent::NoteOff { channel, note: _ } => self.note_off(channel as usize),
                        _ => {}
                    }
                }
                if seq.is_finished() {
                    self.playing = false;
                }
                self.sequencer = Some(seq);
            }
        }
        self.core.render(out);
    }

    pub fn core(&self) -> &C {
        &self.core
    }
}

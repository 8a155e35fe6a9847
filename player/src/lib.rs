//! Player — orchestrates one loaded cutscene's VM/Renderer pair together
//! with a paired Synth Driver, exposing the load/play/step surface a host
//! shell drives frame by frame.

use flashback_audio::instrument_map;
use flashback_audio::ins;
use flashback_audio::opl3::{NullOpl3Core, Opl3Core};
use flashback_audio::prf;
use flashback_audio::synth_driver::SynthDriver;
use flashback_core::assets::cutscene::Cutscene;
use flashback_core::error::DecodeError;
use flashback_core::gfx::framebuffer::{HEIGHT, WIDTH};
use flashback_core::vm::{FrameEvent, Vm};

const NUM_CHANNELS: usize = 16;

/// Visual playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Playing,
}

/// Audio engine readiness, surfaced separately from visual load errors:
/// a synth that fails to come up leaves visual playback untouched, it just
/// plays silently until retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiState {
    Ready,
    Pending(String),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelChange {
    Muted,
    Unmuted,
    InstrumentChanged,
    OctaveOffsetChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEvent {
    pub slot: u8,
    pub change: ChannelChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub slot: u8,
    pub muted: bool,
    pub instrument_name: Option<String>,
    pub octave_offset: i8,
    pub hw_channel: u8,
}

/// Errors `Player::load` surfaces to the caller verbatim — no partial
/// cutscene is ever installed on a load failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    Decode(DecodeError),
    AssetNotFound(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "{e}"),
            Self::AssetNotFound(name) => write!(f, "asset not found: {name}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<DecodeError> for LoadError {
    fn from(e: DecodeError) -> Self {
        LoadError::Decode(e)
    }
}

/// One named `.INS` asset the caller resolved from its own data directory,
/// paired with the raw bytes. Asset transport is out of scope for this
/// crate; callers resolve names to bytes however their asset pipeline
/// works. Names are matched against a `.PRF` profile's per-slot instrument
/// names case-insensitively, with a trailing `'A'`/`'a'` stripped from the
/// PRF name as a fallback — some profiles reference an alternate-ending
/// variant name (e.g. `BRASS1A`) that only the base `.INS` (`BRASS1`) ships.
pub struct CutsceneAssets<'a> {
    pub cmd: &'a [u8],
    pub pol: &'a [u8],
    pub prf: Option<&'a [u8]>,
    pub instrument_files: &'a [(&'a str, &'a [u8])],
    pub midi: Option<&'a [u8]>,
}

fn find_instrument_bytes<'a>(instrument_files: &'a [(&'a str, &'a [u8])], name: &str) -> Option<&'a [u8]> {
    if let Some(&(_, bytes)) = instrument_files.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        return Some(bytes);
    }
    let stripped = name.strip_suffix(['A', 'a'])?;
    instrument_files.iter().find(|(n, _)| n.eq_ignore_ascii_case(stripped)).map(|&(_, bytes)| bytes)
}

/// Orchestrates a loaded `Cutscene`'s VM/Renderer pair and a paired
/// [`SynthDriver`]. Holds no process-wide state — two `Player`s can be
/// live at once provided each owns its own synth instance.
pub struct Player<C: Opl3Core = NullOpl3Core> {
    vm: Option<Vm>,
    synth: SynthDriver<C>,
    playing: bool,
    loop_enabled: bool,
    audio_enabled: bool,
    volume_model: u8,
    midi_state: MidiState,
    pending_midi: Option<Vec<u8>>,
    on_state_change: Option<Box<dyn FnMut(PlayerState)>>,
    on_midi_state_change: Option<Box<dyn FnMut(&MidiState)>>,
    on_channel_change: Option<Box<dyn FnMut(ChannelEvent)>>,
}

impl<C: Opl3Core> Player<C> {
    pub fn new(core: C) -> Self {
        Player {
            vm: None,
            synth: SynthDriver::new(core),
            playing: false,
            loop_enabled: false,
            audio_enabled: true,
            volume_model: 0,
            midi_state: MidiState::Ready,
            pending_midi: None,
            on_state_change: None,
            on_midi_state_change: None,
            on_channel_change: None,
        }
    }

    pub fn on_state_change(&mut self, f: impl FnMut(PlayerState) + 'static) {
        self.on_state_change = Some(Box::new(f));
    }

    pub fn on_midi_state_change(&mut self, f: impl FnMut(&MidiState) + 'static) {
        self.on_midi_state_change = Some(Box::new(f));
    }

    pub fn on_channel_change(&mut self, f: impl FnMut(ChannelEvent) + 'static) {
        self.on_channel_change = Some(Box::new(f));
    }

    fn emit_state(&mut self, state: PlayerState) {
        if let Some(cb) = &mut self.on_state_change {
            cb(state);
        }
    }

    fn emit_midi_state(&mut self) {
        if let Some(cb) = &mut self.on_midi_state_change {
            cb(&self.midi_state);
        }
    }

    fn emit_channel(&mut self, slot: u8, change: ChannelChange) {
        if let Some(cb) = &mut self.on_channel_change {
            cb(ChannelEvent { slot, change });
        }
    }

    /// Load both `.CMD` and `.POL` bytes and install a fresh `Cutscene`,
    /// cancelling any previous one. Audio assets are best-effort: a missing
    /// `.PRF` plays silently, a malformed `.INS` slot is skipped with a
    /// warning, and a missing/failed `.MID` only moves the MIDI-state
    /// callback to `Failed`/`Pending` — none of those abort the load.
    pub fn load(&mut self, name: &str, assets: CutsceneAssets<'_>) -> Result<(), LoadError> {
        let cutscene = Cutscene::parse(name, assets.cmd, assets.pol)?;

        self.synth.stop_and_reset();
        self.playing = false;

        self.vm = Some(Vm::new(cutscene));
        self.synth.init();

        if let Some(bytes) = assets.prf {
            match prf::parse(bytes) {
                Ok(profile) => {
                    for (slot, name) in profile.instruments.iter().enumerate() {
                        let Some(name) = name else { continue };
                        let Some(data) = find_instrument_bytes(assets.instrument_files, name) else {
                            #[cfg(feature = "logging")]
                            tracing::warn!("no matching .INS asset for profile slot {slot} ({name}), skipping");
                            continue;
                        };
                        match ins::parse(data) {
                            Ok(decoded) => {
                                let note_offset = profile.note_offset(slot).unwrap_or(0);
                                let velocity_offset = profile.velocity_offset(slot).unwrap_or(0);
                                let instrument = instrument_map::build(name.clone(), &decoded, note_offset, velocity_offset);
                                self.synth.set_instrument(slot, instrument);
                            }
                            Err(_err) => {
                                #[cfg(feature = "logging")]
                                tracing::warn!("skipping malformed instrument slot {slot} ({name}): {_err}");
                            }
                        }
                    }
                }
                Err(_err) => {
                    #[cfg(feature = "logging")]
                    tracing::warn!("skipping malformed profile: {_err}");
                }
            }
        }
        self.synth.set_volume_model(self.volume_model);

        self.pending_midi = None;
        match assets.midi {
            None => self.midi_state = MidiState::Ready,
            Some(data) if self.audio_enabled => match self.synth.load_midi(data) {
                Ok(()) => self.midi_state = MidiState::Ready,
                Err(e) => self.midi_state = MidiState::Failed(e.to_string()),
            },
            Some(data) => {
                self.pending_midi = Some(data.to_vec());
                self.midi_state = MidiState::Pending(name.to_string());
            }
        }
        self.emit_midi_state();
        self.emit_state(PlayerState::Stopped);
        Ok(())
    }

    /// Retry audio initialization — if a `.MID` load was deferred because
    /// audio was disabled at load time, attempt it now.
    pub fn ensure_initialized(&mut self) {
        if !self.audio_enabled {
            return;
        }
        if let Some(data) = self.pending_midi.take() {
            self.midi_state = match self.synth.load_midi(&data) {
                Ok(()) => MidiState::Ready,
                Err(e) => MidiState::Failed(e.to_string()),
            };
            self.emit_midi_state();
        }
    }

    pub fn play(&mut self) -> bool {
        if self.vm.is_none() {
            return false;
        }
        self.playing = true;
        if self.audio_enabled {
            self.synth.play();
        }
        self.emit_state(PlayerState::Playing);
        true
    }

    pub fn stop(&mut self) -> bool {
        self.playing = false;
        self.synth.stop_and_reset();
        self.emit_state(PlayerState::Stopped);
        false
    }

    pub fn toggle_play(&mut self) -> bool {
        if self.playing { self.stop() } else { self.play() }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Advance one frame. When the VM loops back to frame zero and looping
    /// is disabled, playback stops (mirrors `stop()`'s effect without
    /// resetting the synth mid-loop-check).
    pub fn next_frame(&mut self) -> Option<FrameEvent> {
        let vm = self.vm.as_mut()?;
        let event = vm.next_frame();
        if matches!(event, Some(FrameEvent::Looped)) && !self.loop_enabled {
            self.playing = false;
            self.emit_state(PlayerState::Stopped);
        }
        event
    }

    pub fn prev_frame(&mut self) {
        if let Some(vm) = &mut self.vm {
            vm.prev_frame();
        }
    }

    pub fn go_to_frame(&mut self, index: u32) {
        if let Some(vm) = &mut self.vm {
            vm.go_to_frame(index);
        }
    }

    pub fn reset(&mut self) {
        if let Some(vm) = &mut self.vm {
            vm.reset();
        }
    }

    pub fn frame_count(&self) -> u32 {
        self.vm.as_ref().map(|vm| vm.total_frames()).unwrap_or(0)
    }

    pub fn current_frame(&self) -> u32 {
        self.vm.as_ref().map(|vm| vm.current_frame()).unwrap_or(0)
    }

    pub fn framebuffer(&self) -> Option<&[u8; WIDTH * HEIGHT * 4]> {
        self.vm.as_ref().map(|vm| vm.renderer().framebuffer().as_bytes())
    }

    /// Render `out.len()` audio samples, advancing any loaded `.MID` score
    /// if currently playing. A no-op (silence) when audio is disabled.
    pub fn render_audio(&mut self, out: &mut [i16]) {
        if self.audio_enabled {
            self.synth.render_samples(out);
        } else {
            out.fill(0);
        }
    }

    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.audio_enabled = enabled;
        if enabled {
            self.ensure_initialized();
        } else {
            self.synth.all_notes_off();
        }
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
    }

    pub fn set_volume_model(&mut self, n: u8) {
        self.volume_model = n;
        self.synth.set_volume_model(n);
    }

    /// Seek the loaded `.MID` score to `seconds` from the start, releasing
    /// and re-firing note events as needed so channel state matches what
    /// continuous playback would have produced by that point.
    pub fn seek(&mut self, seconds: f64) {
        if self.audio_enabled {
            self.synth.seek(seconds);
        }
    }

    pub fn volume_model(&self) -> u8 {
        self.volume_model
    }

    pub fn get_channels(&self) -> [ChannelInfo; NUM_CHANNELS] {
        std::array::from_fn(|slot| ChannelInfo {
            slot: slot as u8,
            muted: self.synth.is_muted(slot),
            instrument_name: self.synth.instrument_name_for_channel(slot).map(str::to_string),
            octave_offset: self.synth.channel_octave_offset(slot),
            hw_channel: slot as u8,
        })
    }

    /// Mute `ch` as a MIDI CC7 (channel volume) message of value 0 would —
    /// rewrites the channel's total-level registers rather than merely
    /// flipping a flag, so an in-flight release stage is actually silenced.
    pub fn mute_channel(&mut self, ch: usize) {
        self.synth.mute_channel(ch);
        self.emit_channel(ch as u8, ChannelChange::Muted);
    }

    /// Unmute `ch` as a MIDI CC7 value of 127 would, restoring the
    /// instrument's original total-level registers.
    pub fn unmute_channel(&mut self, ch: usize) {
        self.synth.unmute_channel(ch);
        self.emit_channel(ch as u8, ChannelChange::Unmuted);
    }

    pub fn set_channel_instrument(&mut self, ch: usize, name: &str) -> bool {
        let changed = self.synth.set_channel_instrument(ch, name);
        if changed {
            self.emit_channel(ch as u8, ChannelChange::InstrumentChanged);
        }
        changed
    }

    pub fn set_channel_octave_offset(&mut self, ch: usize, delta: i8) {
        self.synth.set_channel_octave_offset(ch, delta);
        self.emit_channel(ch as u8, ChannelChange::OctaveOffsetChanged);
    }
}

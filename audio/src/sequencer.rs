//! Ticks a parsed [`MidiFile`] forward in wall-clock time, firing note
//! events against a [`SynthDriver`] as their tick position is reached.
//! Tracks are merged into one absolute-tick timeline at load time — every
//! Flashback-style cutscene score is a single simultaneous performance,
//! never independent non-simultaneous patterns (format 2 is already
//! rejected at parse time).

use crate::midi::{MidiEvent, MidiFile};

const DEFAULT_US_PER_QUARTER: u32 = 500_000; // 120 BPM, per the SMF spec's default

fn flatten(file: &MidiFile) -> Vec<(u32, MidiEvent)> {
    let mut merged = Vec::new();
    for track in &file.tracks {
        let mut tick = 0u32;
        for event in track {
            tick = tick.saturating_add(event.delta_ticks);
            merged.push((tick, event.event));
        }
    }
    merged.sort_by_key(|(tick, _)| *tick);
    merged
}

/// Replayable event timeline for one loaded `.MID` file.
pub struct Sequencer {
    events: Vec<(u32, MidiEvent)>,
    next_index: usize,
    current_tick_us: f64,
    us_per_tick: f64,
    finished: bool,
}

impl Sequencer {
    pub fn new(file: &MidiFile) -> Self {
        let division = file.division.max(1) as f64;
        Sequencer {
            events: flatten(file),
            next_index: 0,
            current_tick_us: 0.0,
            us_per_tick: DEFAULT_US_PER_QUARTER as f64 / division,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn rewind(&mut self) {
        self.next_index = 0;
        self.current_tick_us = 0.0;
        self.finished = false;
    }

    /// Advance the playhead by `elapsed_us` microseconds, invoking `on_event`
    /// for every event whose absolute tick position falls within the
    /// elapsed window, in order. `Set Tempo` events adjust pacing for
    /// subsequent ticks rather than being forwarded to `on_event`.
    pub fn advance(&mut self, elapsed_us: f64, mut on_event: impl FnMut(MidiEvent)) {
        if self.finished {
            return;
        }
        let target_us = self.current_tick_us + elapsed_us;
        while self.next_index < self.events.len() {
            let (tick, event) = self.events[self.next_index];
            let event_us = tick as f64 * self.us_per_tick;
            if event_us > target_us {
                break;
            }
            match event {
                MidiEvent::SetTempo(us_per_quarter) => {
                    // Tempo changes rescale pacing for ticks after this
                    // point; division (ticks/quarter) never changes mid-file.
                    let division_ticks = if self.us_per_tick > 0.0 {
                        DEFAULT_US_PER_QUARTER as f64 / self.us_per_tick
                    } else {
                        1.0
                    };
                    self.us_per_tick = us_per_quarter as f64 / division_ticks.max(1.0);
                }
                MidiEvent::EndOfTrack => {
                    self.finished = true;
                }
                other => on_event(other),
            }
            self.next_index += 1;
        }
        self.current_tick_us = target_us;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::TrackEvent;

    fn file_with(events: Vec<TrackEvent>) -> MidiFile {
        MidiFile { division: 96, tracks: vec![events] }
    }

    #[test]
    fn fires_events_in_tick_order_across_merged_tracks() {
        let file = MidiFile {
            division: 96,
            tracks: vec![
                vec![TrackEvent {
                    delta_ticks: 100,
                    event: MidiEvent::NoteOn { channel: 0, note: 60, velocity: 100 },
                }],
                vec![TrackEvent {
                    delta_ticks: 50,
                    event: MidiEvent::NoteOn { channel: 1, note: 64, velocity: 100 },
                }],
            ],
        };
        let mut seq = Sequencer::new(&file);
        let mut fired = Vec::new();
        // us_per_tick ~ 500000/96 ≈ 5208.3 us. 100 ticks ≈ 520833us.
        seq.advance(600_000.0, |e| fired.push(e));
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0], MidiEvent::NoteOn { channel: 1, note: 64, velocity: 100 });
        assert_eq!(fired[1], MidiEvent::NoteOn { channel: 0, note: 60, velocity: 100 });
    }

    #[test]
    fn end_of_track_marks_sequencer_finished() {
        let file = file_with(vec![TrackEvent { delta_ticks: 0, event: MidiEvent::EndOfTrack }]);
        let mut seq = Sequencer::new(&file);
        seq.advance(10.0, |_| {});
        assert!(seq.is_finished());
    }

    #[test]
    fn rewind_resets_playhead_and_finished_flag() {
        let file = file_with(vec![TrackEvent { delta_ticks: 0, event: MidiEvent::EndOfTrack }]);
        let mut seq = Sequencer::new(&file);
        seq.advance(10.0, |_| {});
        seq.rewind();
        assert!(!seq.is_finished());
    }
}

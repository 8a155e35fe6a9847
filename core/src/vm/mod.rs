//! Bytecode VM. Drives a [`Renderer`] from a decoded [`Script`],
//! one frame at a time, and exposes reset-and-replay frame scrubbing
//! (playback is not reversible: `prev_frame` resets to frame 0 and
//! replays forward).

use crate::assets::cutscene::Cutscene;
use crate::assets::script::{Command, CommandKind, Frame};
use crate::gfx::renderer::Renderer;

/// Flags carried forward across frames, distinct from the draw lists
/// (which the [`Renderer`] owns) — the set of values a `markCurPos` does
/// *not* reset.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeState {
    pub clear_screen: u8,
}

/// Notification emitted once per executed frame, for host UIs that want to
/// react to playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    Advanced { subscene: usize, frame: usize },
    Looped,
}

/// The bytecode interpreter. Owns the loaded cutscene and the renderer it
/// drives; playback position is a `(subscene, frame)` pair plus a global
/// frame counter kept in sync with it.
pub struct Vm {
    cutscene: Cutscene,
    renderer: Renderer,
    state: RuntimeState,
    global_frame: u32,
}

impl Vm {
    pub fn new(cutscene: Cutscene) -> Self {
        let mut renderer = Renderer::new();
        renderer.load_shapes(cutscene.shapes.clone());
        let mut vm = Self {
            cutscene,
            renderer,
            state: RuntimeState::default(),
            global_frame: 0,
        };
        vm.replay_from_start_through(0);
        vm
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn current_frame(&self) -> u32 {
        self.global_frame
    }

    pub fn total_frames(&self) -> u32 {
        self.cutscene.total_frames()
    }

    /// Run every command of one frame against the renderer, render the
    /// result, then apply the frame's trailing `markCurPos` list
    /// transition (if any) so the *next* frame starts from the right
    /// draw-list state. Rendering happens before the transition — a
    /// frame's own `markCurPos` governs what carries into the next frame,
    /// not what gets drawn in this one.
    fn run_frame(&mut self, frame: &Frame) {
        let mut saw_mark = false;
        for cmd in &frame.commands {
            if matches!(cmd.kind, CommandKind::MarkCurPos { .. }) {
                saw_mark = true;
                continue;
            }
            execute_on(&mut self.renderer, &mut self.state, &self.cutscene, cmd);
        }
        self.renderer.render();
        if saw_mark {
            self.renderer.clear_drawn_shapes();
        }
    }

    /// Reset all runtime state and replay every frame from the start of the
    /// cutscene up to and including frame `target` (inclusive, 0-based
    /// global index). This is the VM's only form of seeking — there is no
    /// reverse execution.
    fn replay_from_start_through(&mut self, target: u32) {
        self.renderer.clear_all_shapes();
        self.renderer.reset_palette();
        self.renderer.set_clear_screen(1);
        self.state = RuntimeState { clear_screen: 1 };

        let mut global = 0u32;
        'subscenes: for si in 0..self.cutscene.script.subscenes.len() {
            let frame_count = self.cutscene.script.subscenes[si].frames.len();
            for fi in 0..frame_count {
                let frame = self.cutscene.script.subscenes[si].frames[fi].clone();
                self.run_frame(&frame);
                if global >= target {
                    break 'subscenes;
                }
                global += 1;
            }
        }
        self.global_frame = global.min(self.total_frames().saturating_sub(1));
    }

    /// Advance exactly one frame against the current (already-settled)
    /// renderer state — no replay needed, since forward-only playback is
    /// the common case and this avoids re-running the whole cutscene on
    /// every call.
    pub fn next_frame(&mut self) -> Option<FrameEvent> {
        let total = self.total_frames();
        if total == 0 {
            return None;
        }
        let next = self.global_frame + 1;
        if next >= total {
            self.replay_from_start_through(0);
            return Some(FrameEvent::Looped);
        }
        let Some((si, fi)) = self.cutscene.locate_frame(next) else {
            return None;
        };
        let frame = self.cutscene.script.subscenes[si].frames[fi].clone();
        self.run_frame(&frame);
        self.global_frame = next;
        Some(FrameEvent::Advanced { subscene: si, frame: fi })
    }

    /// Step backward one frame. There is no reverse bytecode
    /// execution: this resets to frame 0 and replays forward to
    /// `current - 1`.
    pub fn prev_frame(&mut self) -> Option<FrameEvent> {
        if self.global_frame == 0 {
            return None;
        }
        let target = self.global_frame - 1;
        self.go_to_frame(target)
    }

    /// Seek to an arbitrary global frame index by full reset-and-replay.
    pub fn go_to_frame(&mut self, target: u32) -> Option<FrameEvent> {
        let total = self.total_frames();
        if total == 0 {
            return None;
        }
        let target = target.min(total - 1);
        self.replay_from_start_through(target);
        self.cutscene
            .locate_frame(self.global_frame)
            .map(|(si, fi)| FrameEvent::Advanced { subscene: si, frame: fi })
    }

    pub fn reset(&mut self) {
        self.replay_from_start_through(0);
    }
}

/// Every bytecode command's effect on the renderer and runtime state,
/// except `markCurPos` — its list-transition is applied by
/// [`Vm::run_frame`] after the frame renders, not while commands execute.
fn execute_on(renderer: &mut Renderer, state: &mut RuntimeState, cutscene: &Cutscene, cmd: &Command) {
    match &cmd.kind {
        CommandKind::MarkCurPos { .. } => {}
        CommandKind::RefreshScreen { clear_mode } => {
            state.clear_screen = *clear_mode;
            renderer.set_clear_screen(*clear_mode);
            if *clear_mode != 0 {
                renderer.clear_drawn_shapes();
            }
        }
        CommandKind::DrawShape { shape_id, pos } => {
            renderer.draw_shape(*shape_id, *pos);
        }
        CommandKind::DrawShapeScale {
            shape_id,
            pos,
            zoom,
            origin_x,
            origin_y,
        } => {
            renderer.draw_shape_scale(*shape_id, *pos, *zoom, *origin_x, *origin_y);
        }
        CommandKind::DrawShapeScaleRot {
            shape_id,
            pos,
            zoom,
            origin_x,
            origin_y,
            rot_a,
            ..
        } => {
            renderer.draw_shape_scale_rotate(*shape_id, *pos, *zoom, *origin_x, *origin_y, *rot_a);
        }
        CommandKind::SetPalette { pal_num, buf_num } => {
            // The destination half is the source buffer number XORed with
            // 1, masked to one bit — this is what makes setPalette
            // alternate which runtime half it targets.
            let dest_half = ((*buf_num) ^ 1) as usize & 1;
            if let Some(src) = cutscene.palettes.get(*pal_num as usize) {
                renderer.set_palette(dest_half, src);
            }
        }
        // WaitForSync, DrawCaptionText, Nop, Skip3, RefreshAll, CopyScreen,
        // DrawTextAtPos, HandleKeys: no renderer effect in this core (see
        // Non-goals — timing sync, text, input, and page-flip bookkeeping
        // are host/front-end concerns).
        _ => {}
    }
}

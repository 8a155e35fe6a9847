//! Integration tests for VM playback determinism: stepping frame-by-frame
//! must reach the same renderer state as jumping straight to that frame
//! (the only seeking `Vm` supports is reset-and-replay), and replaying a
//! whole cutscene twice must produce byte-identical framebuffers.

use flashback_core::prelude::*;
use flashback_core::assets::color::Colour;
use flashback_core::assets::script::CommandKind;
use flashback_core::assets::shape::{Primitive, PrimitiveKind};

fn frame(commands: Vec<Command>) -> Frame {
    Frame { commands }
}

fn cmd(kind: CommandKind) -> Command {
    Command { kind, legacy_bits: 0 }
}

/// A three-frame, one-subscene cutscene: palette set, a shape drawn, then
/// two bare frame boundaries, all sharing one 16-colour palette and one
/// single-point shape.
fn sample_cutscene() -> Cutscene {
    let shape = Shape {
        id: 0,
        primitives: vec![Primitive {
            colour_index: 2,
            alpha: false,
            offset: None,
            kind: PrimitiveKind::Point { x: 10, y: 10 },
        }],
    };
    let palette = [Colour { r: 20, g: 40, b: 60 }; 16];

    let frame_a = frame(vec![
        cmd(CommandKind::SetPalette { pal_num: 0, buf_num: 0 }),
        cmd(CommandKind::DrawShape { shape_id: 0, pos: Some((5, 5)) }),
        cmd(CommandKind::MarkCurPos { alt: false }),
    ]);
    let frame_b = frame(vec![cmd(CommandKind::MarkCurPos { alt: false })]);
    let frame_c = frame(vec![
        cmd(CommandKind::DrawShape { shape_id: 0, pos: Some((50, 50)) }),
        cmd(CommandKind::MarkCurPos { alt: false }),
    ]);

    Cutscene {
        name: "DETERMINISM".into(),
        shapes: vec![shape],
        palettes: vec![palette],
        script: Script {
            subscenes: vec![Subscene {
                id: 0,
                frames: vec![frame_a, frame_b, frame_c],
            }],
            base_offset: 2,
        },
    }
}

#[test]
fn stepping_forward_matches_seeking_directly() {
    let mut stepped = Vm::new(sample_cutscene());
    stepped.next_frame();
    stepped.next_frame();

    let mut seeked = Vm::new(sample_cutscene());
    seeked.go_to_frame(2);

    assert_eq!(stepped.current_frame(), seeked.current_frame());
    assert_eq!(
        stepped.renderer().framebuffer().as_bytes(),
        seeked.renderer().framebuffer().as_bytes()
    );
}

#[test]
fn replaying_the_same_cutscene_twice_is_byte_identical() {
    let mut first = Vm::new(sample_cutscene());
    first.go_to_frame(2);
    let first_bytes = first.renderer().framebuffer().as_bytes().to_vec();

    let mut second = Vm::new(sample_cutscene());
    second.next_frame();
    second.next_frame();
    let second_bytes = second.renderer().framebuffer().as_bytes().to_vec();

    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn prev_frame_resets_and_replays_rather_than_stepping_backward() {
    let mut vm = Vm::new(sample_cutscene());
    vm.go_to_frame(2);
    vm.prev_frame();
    assert_eq!(vm.current_frame(), 1);

    let mut direct = Vm::new(sample_cutscene());
    direct.go_to_frame(1);
    assert_eq!(
        vm.renderer().framebuffer().as_bytes(),
        direct.renderer().framebuffer().as_bytes()
    );
}

#[test]
fn looping_past_the_last_frame_restarts_at_frame_zero() {
    let mut vm = Vm::new(sample_cutscene());
    vm.go_to_frame(vm.total_frames() - 1);
    let event = vm.next_frame();
    assert_eq!(event, Some(flashback_core::vm::FrameEvent::Looped));
    assert_eq!(vm.current_frame(), 0);
}

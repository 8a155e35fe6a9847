//! Integration tests for the two `.CMD` testable properties: opcode
//! round-trip (`encode_command` reproduces the bytes `script::parse` read)
//! and frame framing (`markCurPos` count equals frame count).

use flashback_core::assets::script::{self, encode_command, CommandKind};

/// Builds a single-subscene `.CMD` file by hand: `sub_count = 0` makes
/// the parser treat the whole remaining stream as one subscene starting
/// right after the count field (see `script::parse`).
fn wrap_subscene(mut command_bytes: Vec<u8>) -> Vec<u8> {
    let mut data = vec![0x00, 0x00];
    data.append(&mut command_bytes);
    data.push(0x80); // stream terminator: high bit set
    data
}

#[test]
fn opcode_round_trip_reproduces_original_bytes() {
    let command_bytes: Vec<u8> = vec![
        0x10, 0x01, 0x00, // SetPalette(pal=1, buf=0)
        0x0C, 0x00, 0x05, // DrawShape(shape_id=5, no pos)
        0x18, 0x00, 0x0A, // DrawCaptionText(string_id=10)
        0x1C, // Nop
        0x00, // MarkCurPos
    ];
    let data = wrap_subscene(command_bytes.clone());
    let script = script::parse(&data).expect("well-formed synthetic script");

    let frame = &script.subscenes[0].frames[0];
    assert_eq!(frame.commands.len(), 5);

    let mut re_encoded = Vec::new();
    for cmd in &frame.commands {
        re_encoded.extend(encode_command(cmd));
    }
    assert_eq!(re_encoded, command_bytes);
}

#[test]
fn frame_count_equals_total_mark_cur_pos_commands() {
    // Three frames: two end on the plain opcode, one on the legacy-alias
    // opcode 5, all of which must still count as a frame boundary.
    let command_bytes: Vec<u8> = vec![
        0x1C, 0x00, // Nop, MarkCurPos
        0x1C, 0x05, // Nop, MarkCurPos(alt)
        0x00, // MarkCurPos (empty frame)
    ];
    let data = wrap_subscene(command_bytes);
    let script = script::parse(&data).expect("well-formed synthetic script");

    let frames = &script.subscenes[0].frames;
    let mark_count: usize = frames
        .iter()
        .flat_map(|f| &f.commands)
        .filter(|c| matches!(c.kind, CommandKind::MarkCurPos { .. }))
        .count();
    assert_eq!(mark_count, frames.len());
    assert_eq!(frames.len(), 3);
}

#[test]
fn trailing_commands_without_a_mark_cur_pos_still_form_a_final_frame() {
    // A stream that ends mid-frame (no trailing markCurPos) still yields
    // one last frame holding whatever commands remain.
    let command_bytes: Vec<u8> = vec![
        0x00, // MarkCurPos (frame 0, empty)
        0x1C, // Nop, stream ends without a second markCurPos
    ];
    let data = wrap_subscene(command_bytes);
    let script = script::parse(&data).expect("well-formed synthetic script");

    let frames = &script.subscenes[0].frames;
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].commands.len(), 1);
    assert!(matches!(frames[1].commands[0].kind, CommandKind::Nop));
}

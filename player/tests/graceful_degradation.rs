//! Integration tests for `Player::load`'s best-effort asset handling: a
//! missing `.PRF`, a malformed `.INS` slot, or a malformed `.MID` file must
//! never abort a load or panic — only a malformed `.CMD`/`.POL` pair does.

use flashback_audio::opl3::Opl3Core;
use flashback_player::{CutsceneAssets, LoadError, MidiState, Player};

#[derive(Default)]
struct SilentCore;

impl Opl3Core for SilentCore {
    fn write_reg(&mut self, _array: u8, _register: u8, _value: u8) {}
    fn render(&mut self, out: &mut [i16]) {
        out.fill(0);
    }
}

/// One subscene, one empty frame: `sub_count = 0`, then a single
/// `markCurPos` byte, then the stream terminator.
fn minimal_cmd_bytes() -> Vec<u8> {
    vec![0x00, 0x00, 0x00, 0x80]
}

/// One shape (a single point) and one palette — same layout as the POL
/// parser's own synthetic fixture.
fn minimal_pol_bytes() -> Vec<u8> {
    let shape_off_tbl = 0x14usize;
    let palette_off = shape_off_tbl + 2;
    let verts_off_tbl = palette_off + 32;
    let shape_data_tbl = verts_off_tbl + 2;
    let verts_data_tbl = shape_data_tbl + 5;

    let mut data = vec![0u8; verts_data_tbl];
    data[0x02..0x04].copy_from_slice(&(shape_off_tbl as u16).to_be_bytes());
    data[0x06..0x08].copy_from_slice(&(palette_off as u16).to_be_bytes());
    data[0x0A..0x0C].copy_from_slice(&(verts_off_tbl as u16).to_be_bytes());
    data[0x0E..0x10].copy_from_slice(&(shape_data_tbl as u16).to_be_bytes());
    data[0x12..0x14].copy_from_slice(&(verts_data_tbl as u16).to_be_bytes());

    data[shape_off_tbl..shape_off_tbl + 2].copy_from_slice(&0u16.to_be_bytes());
    data[palette_off..palette_off + 2].copy_from_slice(&0x0FFFu16.to_be_bytes());
    data[verts_off_tbl..verts_off_tbl + 2].copy_from_slice(&0u16.to_be_bytes());
    data[shape_data_tbl..shape_data_tbl + 2].copy_from_slice(&1u16.to_be_bytes());
    data[shape_data_tbl + 2..shape_data_tbl + 4].copy_from_slice(&0u16.to_be_bytes());
    data[shape_data_tbl + 4] = 7;
    data.extend_from_slice(&[0x00, 0x00, 0x03, 0x00, 0x04]);
    data
}

/// A minimal 753-byte `.PRF` record naming one instrument slot, for tests
/// that don't care about timing fields.
fn minimal_prf_bytes(slot_name: &str) -> Vec<u8> {
    let mut rec = vec![0u8; 753];
    rec[0..slot_name.len()].copy_from_slice(slot_name.as_bytes());
    rec
}

#[test]
fn load_with_no_audio_assets_at_all_succeeds() {
    let mut player = Player::new(SilentCore);
    let cmd = minimal_cmd_bytes();
    let pol = minimal_pol_bytes();
    let result = player.load(
        "TEST",
        CutsceneAssets {
            cmd: &cmd,
            pol: &pol,
            prf: None,
            instrument_files: &[],
            midi: None,
        },
    );
    assert!(result.is_ok());
    assert!(player.framebuffer().is_some());
    assert_eq!(player.frame_count(), 1);
}

#[test]
fn malformed_instrument_slot_is_skipped_not_fatal() {
    let mut player = Player::new(SilentCore);
    let cmd = minimal_cmd_bytes();
    let pol = minimal_pol_bytes();
    let prf = minimal_prf_bytes("BRASS1");
    let garbage: &[u8] = &[0xFF; 3]; // far too short to be a valid .INS record
    let result = player.load(
        "TEST",
        CutsceneAssets {
            cmd: &cmd,
            pol: &pol,
            prf: Some(&prf),
            instrument_files: &[("BRASS1", garbage)],
            midi: None,
        },
    );
    assert!(result.is_ok());
}

#[test]
fn missing_instrument_asset_for_a_named_slot_is_skipped_not_fatal() {
    let mut player = Player::new(SilentCore);
    let cmd = minimal_cmd_bytes();
    let pol = minimal_pol_bytes();
    let prf = minimal_prf_bytes("BRASS1");
    let result = player.load(
        "TEST",
        CutsceneAssets {
            cmd: &cmd,
            pol: &pol,
            prf: Some(&prf),
            instrument_files: &[],
            midi: None,
        },
    );
    assert!(result.is_ok());
}

#[test]
fn malformed_midi_file_marks_midi_state_failed_without_aborting_load() {
    let mut player = Player::new(SilentCore);
    let last_state = std::rc::Rc::new(std::cell::RefCell::new(None));
    let last_state_clone = last_state.clone();
    player.on_midi_state_change(move |s| *last_state_clone.borrow_mut() = Some(s.clone()));

    let cmd = minimal_cmd_bytes();
    let pol = minimal_pol_bytes();
    let bad_midi: &[u8] = b"not a midi file";
    let result = player.load(
        "TEST",
        CutsceneAssets {
            cmd: &cmd,
            pol: &pol,
            prf: None,
            instrument_files: &[],
            midi: Some(bad_midi),
        },
    );
    assert!(result.is_ok());
    assert!(player.framebuffer().is_some());
    assert!(matches!(last_state.borrow().as_ref(), Some(MidiState::Failed(_))));
}

#[test]
fn malformed_cmd_bytes_reject_the_load_and_install_nothing() {
    let mut player = Player::new(SilentCore);
    let bad_cmd: &[u8] = &[]; // too short even for the sub_count field
    let pol = minimal_pol_bytes();
    let result = player.load(
        "TEST",
        CutsceneAssets {
            cmd: bad_cmd,
            pol: &pol,
            prf: None,
            instrument_files: &[],
            midi: None,
        },
    );
    assert!(matches!(result, Err(LoadError::Decode(_))));
    assert!(player.framebuffer().is_none());
}

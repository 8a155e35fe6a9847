//! CMD Parser. Decodes the bytecode script into subscenes, frames,
//! and commands, plus a mirror-image encoder used only by tests and the
//! CLI's `inspect` subcommand (never by the VM).

use crate::error::{DecodeError, DecodeReason};
use crate::io::Reader;

/// `drawTextAtPos` payload when `v != 0xFFFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextAtPos {
    pub string_id: u16,
    pub colour: u8,
    pub x: i8,
    pub y: i8,
}

/// One bytecode command, tagged by opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Frame boundary. `alt` distinguishes opcode 0 from the legacy-alias
    /// opcode 5 so re-encoding reproduces the original byte exactly.
    MarkCurPos { alt: bool },
    RefreshScreen { clear_mode: u8 },
    WaitForSync { frames: u8 },
    DrawShape { shape_id: u16, pos: Option<(i16, i16)> },
    SetPalette { pal_num: u8, buf_num: u8 },
    DrawCaptionText { string_id: u16 },
    Nop,
    Skip3 { bytes: [u8; 3] },
    RefreshAll,
    DrawShapeScale {
        shape_id: u16,
        pos: Option<(i16, i16)>,
        zoom: i16,
        origin_x: u8,
        origin_y: u8,
    },
    DrawShapeScaleRot {
        shape_id: u16,
        pos: Option<(i16, i16)>,
        /// `None` when bit 0x4000 was clear (no catch-all default defined
        /// for zoom; callers treat `None` as zoom 0 / scale 1x).
        zoom: Option<i16>,
        origin_x: u8,
        origin_y: u8,
        rot_a: u16,
        /// `None` means bit 0x2000 was clear; default 180 applies.
        rot_b: Option<u16>,
        /// `None` means bit 0x1000 was clear; default 90 applies.
        rot_c: Option<u16>,
    },
    CopyScreen,
    /// `None` when `v == 0xFFFF` (no text drawn).
    DrawTextAtPos(Option<TextAtPos>),
    /// `(key_mask, target)` pairs; the `0xFF` terminator is implicit and not
    /// stored.
    HandleKeys(Vec<(u8, i16)>),
}

impl CommandKind {
    pub const DEFAULT_ROT_B: u16 = 180;
    pub const DEFAULT_ROT_C: u16 = 90;

    fn opcode(&self) -> u8 {
        match self {
            Self::MarkCurPos { alt: false } => 0,
            Self::RefreshScreen { .. } => 1,
            Self::WaitForSync { .. } => 2,
            Self::DrawShape { .. } => 3,
            Self::SetPalette { .. } => 4,
            Self::MarkCurPos { alt: true } => 5,
            Self::DrawCaptionText { .. } => 6,
            Self::Nop => 7,
            Self::Skip3 { .. } => 8,
            Self::RefreshAll => 9,
            Self::DrawShapeScale { .. } => 10,
            Self::DrawShapeScaleRot { .. } => 11,
            Self::CopyScreen => 12,
            Self::DrawTextAtPos(_) => 13,
            Self::HandleKeys(_) => 14,
        }
    }
}

/// A decoded command plus the two legacy packing bits from its opcode byte
/// (`byte & 0x03`), preserved purely so re-encoding is byte-identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub legacy_bits: u8,
}

/// An ordered sequence of commands terminated by `markCurPos` (the
/// terminator is the frame's last command).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub commands: Vec<Command>,
}

/// A contiguous range of frames within a `.CMD` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscene {
    pub id: u16,
    pub frames: Vec<Frame>,
}

/// The full decoded bytecode script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub subscenes: Vec<Subscene>,
    pub base_offset: usize,
}

fn decode_command(r: &mut Reader<'_>) -> Result<Option<Command>, DecodeError> {
    let b = r.u8()?;
    if b & 0x80 != 0 {
        return Ok(None); // stream ended
    }
    let op = b >> 2;
    let legacy_bits = b & 0x03;
    if op > 14 {
        return Err(DecodeError::invalid(DecodeReason::BadOpcode(op)));
    }

    let kind = match op {
        0 | 5 => CommandKind::MarkCurPos { alt: op == 5 },
        1 => CommandKind::RefreshScreen {
            clear_mode: r.u8()?,
        },
        2 => CommandKind::WaitForSync { frames: r.u8()? },
        3 => decode_draw_shape(r)?,
        4 => CommandKind::SetPalette {
            pal_num: r.u8()?,
            buf_num: r.u8()?,
        },
        6 => CommandKind::DrawCaptionText {
            string_id: r.u16_be()?,
        },
        7 => CommandKind::Nop,
        8 => {
            let mut bytes = [0u8; 3];
            for b in &mut bytes {
                *b = r.u8()?;
            }
            CommandKind::Skip3 { bytes }
        }
        9 => CommandKind::RefreshAll,
        10 => decode_draw_shape_scale(r)?,
        11 => decode_draw_shape_scale_rot(r)?,
        12 => CommandKind::CopyScreen,
        13 => decode_draw_text_at_pos(r)?,
        14 => decode_handle_keys(r)?,
        _ => unreachable!("op > 14 rejected above"),
    };

    Ok(Some(Command { kind, legacy_bits }))
}

fn decode_shape_sw(r: &mut Reader<'_>) -> Result<(u16, u16, Option<(i16, i16)>), DecodeError> {
    let sw = r.u16_be()?;
    let shape_id = sw & 0x7FF;
    let pos = if sw & 0x8000 != 0 {
        Some((r.i16_be()?, r.i16_be()?))
    } else {
        None
    };
    Ok((sw, shape_id, pos))
}

fn decode_draw_shape(r: &mut Reader<'_>) -> Result<CommandKind, DecodeError> {
    let (_sw, shape_id, pos) = decode_shape_sw(r)?;
    Ok(CommandKind::DrawShape { shape_id, pos })
}

fn decode_draw_shape_scale(r: &mut Reader<'_>) -> Result<CommandKind, DecodeError> {
    let (_sw, shape_id, pos) = decode_shape_sw(r)?;
    let zoom = r.i16_be()?;
    let origin_x = r.u8()?;
    let origin_y = r.u8()?;
    Ok(CommandKind::DrawShapeScale {
        shape_id,
        pos,
        zoom,
        origin_x,
        origin_y,
    })
}

fn decode_draw_shape_scale_rot(r: &mut Reader<'_>) -> Result<CommandKind, DecodeError> {
    let (sw, shape_id, pos) = decode_shape_sw(r)?;
    let zoom = if sw & 0x4000 != 0 {
        Some(r.i16_be()?)
    } else {
        None
    };
    let origin_x = r.u8()?;
    let origin_y = r.u8()?;
    let rot_a = r.u16_be()?;
    let rot_b = if sw & 0x2000 != 0 {
        Some(r.u16_be()?)
    } else {
        None
    };
    let rot_c = if sw & 0x1000 != 0 {
        Some(r.u16_be()?)
    } else {
        None
    };

    if rot_b.is_some() && rot_c.is_some() {
        return Err(DecodeError::invalid(DecodeReason::UnsupportedDualRotation));
    }

    Ok(CommandKind::DrawShapeScaleRot {
        shape_id,
        pos,
        zoom,
        origin_x,
        origin_y,
        rot_a,
        rot_b,
        rot_c,
    })
}

fn decode_draw_text_at_pos(r: &mut Reader<'_>) -> Result<CommandKind, DecodeError> {
    let v = r.u16_be()?;
    if v == 0xFFFF {
        return Ok(CommandKind::DrawTextAtPos(None));
    }
    let string_id = v & 0x0FFF;
    let colour = ((v >> 12) & 0xF) as u8;
    let x = r.i8()?;
    let y = r.i8()?;
    Ok(CommandKind::DrawTextAtPos(Some(TextAtPos {
        string_id,
        colour,
        x,
        y,
    })))
}

fn decode_handle_keys(r: &mut Reader<'_>) -> Result<CommandKind, DecodeError> {
    let mut pairs = Vec::new();
    loop {
        let key_mask = r.u8()?;
        if key_mask == 0xFF {
            break;
        }
        let target = r.i16_be()?;
        pairs.push((key_mask, target));
    }
    Ok(CommandKind::HandleKeys(pairs))
}

fn group_frames(commands: Vec<Command>) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut current: Vec<Command> = Vec::new();
    for cmd in commands {
        let is_mark = matches!(cmd.kind, CommandKind::MarkCurPos { .. });
        current.push(cmd);
        if is_mark {
            frames.push(Frame {
                commands: std::mem::take(&mut current),
            });
        }
    }
    if !current.is_empty() {
        frames.push(Frame { commands: current });
    }
    frames
}

fn parse_subscene_commands(data: &[u8], start: usize) -> Result<Vec<Command>, DecodeError> {
    let mut r = Reader::at(data, start);
    let mut commands = Vec::new();
    while let Some(cmd) = decode_command(&mut r)? {
        commands.push(cmd);
    }
    Ok(commands)
}

/// Parse a `.CMD` asset.
pub fn parse(data: &[u8]) -> Result<Script, DecodeError> {
    let sub_count = crate::io::u16_be_at(data, 0)?;

    let (offsets, base_offset): (Vec<u16>, usize) = if sub_count == 0 {
        (vec![0], 2)
    } else {
        let mut r = Reader::at(data, 2);
        let mut offsets = Vec::with_capacity(sub_count as usize);
        for _ in 0..sub_count {
            offsets.push(r.u16_be()?);
        }
        (offsets, (sub_count as usize + 1) * 2)
    };

    let mut subscenes = Vec::with_capacity(offsets.len());
    for (id, off) in offsets.into_iter().enumerate() {
        let start = base_offset + off as usize;
        let commands = parse_subscene_commands(data, start)?;
        subscenes.push(Subscene {
            id: id as u16,
            frames: group_frames(commands),
        });
    }

    Ok(Script {
        subscenes,
        base_offset,
    })
}

// ---------------------------------------------------------------------------
// Encoder (tests + CLI inspect only — never used by the VM)
// ---------------------------------------------------------------------------

fn encode_shape_sw(shape_id: u16, pos: Option<(i16, i16)>, extra_flags: u16) -> (u16, Vec<u8>) {
    let mut sw = (shape_id & 0x7FF) | extra_flags;
    let mut tail = Vec::new();
    if let Some((x, y)) = pos {
        sw |= 0x8000;
        tail.extend_from_slice(&x.to_be_bytes());
        tail.extend_from_slice(&y.to_be_bytes());
    }
    (sw, tail)
}

/// Re-encode a single command to its original byte representation.
pub fn encode_command(cmd: &Command) -> Vec<u8> {
    let op = cmd.kind.opcode();
    let mut out = vec![(op << 2) | (cmd.legacy_bits & 0x03)];

    match &cmd.kind {
        CommandKind::MarkCurPos { .. } | CommandKind::Nop | CommandKind::RefreshAll | CommandKind::CopyScreen => {}
        CommandKind::RefreshScreen { clear_mode } => out.push(*clear_mode),
        CommandKind::WaitForSync { frames } => out.push(*frames),
        CommandKind::DrawShape { shape_id, pos } => {
            let (sw, tail) = encode_shape_sw(*shape_id, *pos, 0);
            out.extend_from_slice(&sw.to_be_bytes());
            out.extend_from_slice(&tail);
        }
        CommandKind::SetPalette { pal_num, buf_num } => {
            out.push(*pal_num);
            out.push(*buf_num);
        }
        CommandKind::DrawCaptionText { string_id } => {
            out.extend_from_slice(&string_id.to_be_bytes());
        }
        CommandKind::Skip3 { bytes } => out.extend_from_slice(bytes),
        CommandKind::DrawShapeScale {
            shape_id,
            pos,
            zoom,
            origin_x,
            origin_y,
        } => {
            let (sw, tail) = encode_shape_sw(*shape_id, *pos, 0);
            out.extend_from_slice(&sw.to_be_bytes());
            out.extend_from_slice(&tail);
            out.extend_from_slice(&zoom.to_be_bytes());
            out.push(*origin_x);
            out.push(*origin_y);
        }
        CommandKind::DrawShapeScaleRot {
            shape_id,
            pos,
            zoom,
            origin_x,
            origin_y,
            rot_a,
            rot_b,
            rot_c,
        } => {
            let mut flags = 0u16;
            if zoom.is_some() {
                flags |= 0x4000;
            }
            if rot_b.is_some() {
                flags |= 0x2000;
            }
            if rot_c.is_some() {
                flags |= 0x1000;
            }
            let (sw, tail) = encode_shape_sw(*shape_id, *pos, flags);
            out.extend_from_slice(&sw.to_be_bytes());
            out.extend_from_slice(&tail);
            if let Some(z) = zoom {
                out.extend_from_slice(&z.to_be_bytes());
            }
            out.push(*origin_x);
            out.push(*origin_y);
            out.extend_from_slice(&rot_a.to_be_bytes());
            if let Some(b) = rot_b {
                out.extend_from_slice(&b.to_be_bytes());
            }
            if let Some(c) = rot_c {
                out.extend_from_slice(&c.to_be_bytes());
            }
        }
        CommandKind::DrawTextAtPos(None) => {
            out.extend_from_slice(&0xFFFFu16.to_be_bytes());
        }
        CommandKind::DrawTextAtPos(Some(t)) => {
            let v = (t.string_id & 0x0FFF) | (((t.colour & 0xF) as u16) << 12);
            out.extend_from_slice(&v.to_be_bytes());
            out.push(t.x as u8);
            out.push(t.y as u8);
        }
        CommandKind::HandleKeys(pairs) => {
            for (mask, target) in pairs {
                out.push(*mask);
                out.extend_from_slice(&target.to_be_bytes());
            }
            out.push(0xFF);
        }
    }

    out
}

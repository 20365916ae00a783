use crate::error::*;
use crate::types::*;
use byteorder::{ByteOrder, ReadBytesExt, WriteBytesExt, BE};
use pulsegrid::behavior::{Cycle, Euclid, Toll};
use pulsegrid::note::{Control, ControlKind};
use pulsegrid::{Behavior, Direction, Emitter, Hole, Node, NoteDefaults};
use std::convert::TryFrom;

pub const EMIT: ID = ID::new(*b"EMIT");
pub const HOLE: ID = ID::new(*b"HOLE");

const ARMED: u8 = 0x01;
const MUTED: u8 = 0x02;
const RETRIG: u8 = 0x04;

const CONTROLLER: u8 = 0;
const AFTER_TOUCH: u8 = 1;

/// One occupied cell.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub x: u16,
    pub y: u16,
    pub node: Node,
}

impl NodeRecord {
    const SIZE: usize = 8;

    pub(crate) fn read(data: &[u8], width: u16, height: u16) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(BankError::InvalidFormat);
        }

        let x = BE::read_u16(&data[0..2]);
        let y = BE::read_u16(&data[2..4]);
        if x >= width || y >= height {
            return Err(BankError::OutOfBounds(x, y));
        }
        let kind = ID::try_from(&data[4..8])?;
        let mut body = &data[Self::SIZE..];

        let node: Node = if kind == EMIT {
            read_emitter(&mut body)?.into()
        } else if kind == HOLE {
            read_hole(&mut body, (x, y), width, height)?.into()
        } else {
            return Err(BankError::UnknownNodeKind(kind.to_string()));
        };

        Ok(Self { x, y, node })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut body = Vec::new();
        body.write_u16::<BE>(self.x)?;
        body.write_u16::<BE>(self.y)?;
        match &self.node {
            Node::Emitter(emitter) => {
                body.extend_from_slice(EMIT.data());
                write_emitter(&mut body, emitter)?;
            }
            Node::Hole(hole) => {
                body.extend_from_slice(HOLE.data());
                write_param_i16(&mut body, &hole.dest_x)?;
                write_param_i16(&mut body, &hole.dest_y)?;
            }
            // only exists in flight
            Node::Signal(_) => return Ok(()),
        }
        write_chunk(out, crate::NODE, &body)
    }
}

fn read_behavior(data: &mut &[u8]) -> Result<Behavior> {
    Ok(match data.read_u8()? {
        0 => Behavior::Bang,
        1 => Behavior::Spread,
        2 => Behavior::Pass,
        3 => Behavior::Cycle(Cycle::with_cursor(usize::from(data.read_u8()?))),
        4 => Behavior::Dice,
        5 => {
            let count = data.read_u8()?;
            let (threshold, jitter) = read_param_u8(data)?;
            let mut toll = Toll::new(threshold).with_count(count);
            toll.threshold.set_random_amount(jitter);
            Behavior::Toll(toll)
        }
        6 => {
            let (steps, steps_jitter) = read_param_u8(data)?;
            let (triggers, triggers_jitter) = read_param_u8(data)?;
            let (offset, offset_jitter) = read_param_u8(data)?;
            let mut euclid = Euclid::new(steps, triggers, offset);
            euclid.steps.set_random_amount(steps_jitter);
            euclid.triggers.set_random_amount(triggers_jitter);
            euclid.offset.set_random_amount(offset_jitter);
            Behavior::Euclid(euclid)
        }
        7 => Behavior::Zone,
        tag => return Err(BankError::UnknownBehavior(tag)),
    })
}

fn write_behavior(out: &mut Vec<u8>, behavior: &Behavior) -> Result<()> {
    match behavior {
        Behavior::Bang => out.write_u8(0)?,
        Behavior::Spread => out.write_u8(1)?,
        Behavior::Pass => out.write_u8(2)?,
        Behavior::Cycle(cycle) => {
            out.write_u8(3)?;
            out.write_u8(u8::try_from(cycle.cursor()).unwrap_or(0))?;
        }
        Behavior::Dice => out.write_u8(4)?,
        Behavior::Toll(toll) => {
            out.write_u8(5)?;
            out.write_u8(toll.count())?;
            write_param_u8(out, &toll.threshold)?;
        }
        Behavior::Euclid(euclid) => {
            out.write_u8(6)?;
            write_param_u8(out, &euclid.steps)?;
            write_param_u8(out, &euclid.triggers)?;
            write_param_u8(out, &euclid.offset)?;
        }
        Behavior::Zone => out.write_u8(7)?,
    }
    Ok(())
}

fn read_emitter(data: &mut &[u8]) -> Result<Emitter> {
    let behavior = read_behavior(data)?;
    let directions = Direction::from_bits_truncate(data.read_u8()?);
    let flags = data.read_u8()?;

    let mut emitter = Emitter::new(behavior, directions, &NoteDefaults::default());
    if flags & ARMED != 0 {
        emitter.arm(Direction::NONE);
    } else {
        emitter.disarm();
    }
    emitter.muted = flags & MUTED != 0;
    emitter.retrig = flags & RETRIG != 0;

    let note = &mut emitter.note;
    let (key, key_jitter) = read_param_u8(data)?;
    note.key.set(key);
    note.key.set_random_amount(key_jitter);
    note.key.silent = data.read_u8()? != 0;

    let (channel, jitter) = read_param_u8(data)?;
    apply_param(&mut note.channel, channel, jitter);
    let (velocity, jitter) = read_param_u8(data)?;
    apply_param(&mut note.velocity, velocity, jitter);
    let (length, jitter) = read_param_u8(data)?;
    apply_param(&mut note.length, length, jitter);
    note.set_probability(data.read_u8()?);

    let count = data.read_u8()?;
    for _ in 0..count {
        let slot = usize::from(data.read_u8()?);
        let kind = data.read_u8()?;
        let controller = data.read_u8()?;
        let (value, jitter) = read_param_u8(data)?;
        let mut control = match kind {
            CONTROLLER => Control::controller(controller, value),
            AFTER_TOUCH => Control::after_touch(value),
            other => return Err(BankError::UnknownControl(other)),
        };
        control.value.set_random_amount(jitter);
        if let Some(cell) = note.controls.get_mut(slot) {
            *cell = Some(control);
        }
    }

    Ok(emitter)
}

fn write_emitter(out: &mut Vec<u8>, emitter: &Emitter) -> Result<()> {
    write_behavior(out, &emitter.behavior)?;
    out.write_u8(emitter.directions.bits())?;

    let mut flags = 0;
    if emitter.is_armed() {
        flags |= ARMED;
    }
    if emitter.muted {
        flags |= MUTED;
    }
    if emitter.retrig {
        flags |= RETRIG;
    }
    out.write_u8(flags)?;

    let note = &emitter.note;
    write_param_u8(out, note.key.param())?;
    out.write_u8(note.key.silent as u8)?;
    write_param_u8(out, &note.channel)?;
    write_param_u8(out, &note.velocity)?;
    write_param_u8(out, &note.length)?;
    out.write_u8(note.probability())?;

    let controls: Vec<_> = note
        .controls
        .iter()
        .enumerate()
        .filter_map(|(slot, control)| control.as_ref().map(|control| (slot, control)))
        .collect();
    out.write_u8(controls.len() as u8)?;
    for (slot, control) in controls {
        out.write_u8(slot as u8)?;
        match control.kind {
            ControlKind::Controller(controller) => {
                out.write_u8(CONTROLLER)?;
                out.write_u8(controller)?;
            }
            ControlKind::AfterTouch => {
                out.write_u8(AFTER_TOUCH)?;
                out.write_u8(0)?;
            }
        }
        write_param_u8(out, &control.value)?;
    }
    Ok(())
}

fn read_hole(data: &mut &[u8], origin: (u16, u16), width: u16, height: u16) -> Result<Hole> {
    let (dest_x, jitter_x) = read_param_i16(data)?;
    let (dest_y, jitter_y) = read_param_i16(data)?;
    let mut hole = Hole::new(
        (usize::from(origin.0), usize::from(origin.1)),
        (dest_x, dest_y),
        usize::from(width),
        usize::from(height),
    );
    hole.dest_x.set_random_amount(jitter_x);
    hole.dest_y.set_random_amount(jitter_y);
    Ok(hole)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsegrid::Scale;

    fn round_trip(record: &NodeRecord) -> NodeRecord {
        let mut out = Vec::new();
        record.write(&mut out).unwrap();
        let mut data = &out[..];
        let (id, body) = read_chunk(&mut data).unwrap();
        assert_eq!(id.data(), b"NODE");
        NodeRecord::read(body, 16, 16).unwrap()
    }

    #[test]
    fn emitter_keeps_behavior_state_and_note() {
        let mut toll = Toll::new(5).with_count(2);
        toll.threshold.set_random_amount(-2);
        let mut emitter = Emitter::new(
            Behavior::Toll(toll),
            Direction::UP | Direction::LEFT,
            &NoteDefaults::default(),
        );
        emitter.retrig = true;
        emitter.note.key.set(72);
        emitter.note.key.set_random_amount(3);
        emitter.note.channel.set(4);
        emitter.note.velocity.set_random_amount(-20);
        emitter.note.length.set(127);
        emitter.note.set_probability(65);
        emitter.note.controls[1] = Some(Control::controller(1, 64));
        emitter.note.controls[3] = Some(Control::after_touch(30));

        let record = NodeRecord {
            x: 3,
            y: 9,
            node: emitter.into(),
        };
        assert_eq!(round_trip(&record), record);
    }

    #[test]
    fn every_behavior_survives() {
        let behaviors = vec![
            Behavior::Bang,
            Behavior::Spread,
            Behavior::Pass,
            Behavior::Cycle(Cycle::with_cursor(2)),
            Behavior::Dice,
            Behavior::Euclid(Euclid::new(12, 5, 3)),
            Behavior::Zone,
        ];
        for behavior in behaviors {
            let emitter = Emitter::new(behavior, Direction::DOWN, &NoteDefaults::default());
            let record = NodeRecord {
                x: 0,
                y: 0,
                node: emitter.into(),
            };
            assert_eq!(round_trip(&record), record);
        }
    }

    #[test]
    fn hole_destination_and_jitter() {
        let mut hole = Hole::new((2, 2), (11, 4), 16, 16);
        hole.dest_y.set_random_amount(2);
        let record = NodeRecord {
            x: 2,
            y: 2,
            node: hole.into(),
        };
        assert_eq!(round_trip(&record), record);
    }

    #[test]
    fn played_state_is_not_stored() {
        let bus = pulsegrid::Bus::default();
        let mut emitter = Emitter::new(Behavior::Bang, Direction::DOWN, &NoteDefaults::default());
        emitter.trigger(0, Scale::Chromatic, 0, &bus);
        let record = NodeRecord {
            x: 1,
            y: 1,
            node: emitter.into(),
        };
        let restored = round_trip(&record);
        let restored = restored.node.as_emitter().unwrap();
        assert!(!restored.is_armed());
        assert!(!restored.is_triggered());
        assert!(!restored.note.is_playing());
    }

    #[test]
    fn rejects_unknown_kinds_and_outside_cells() {
        let mut data = vec![0, 1, 0, 1];
        data.extend_from_slice(b"WARP");
        assert!(matches!(
            NodeRecord::read(&data, 4, 4),
            Err(BankError::UnknownNodeKind(kind)) if kind == "WARP"
        ));

        let mut data = vec![0, 9, 0, 1];
        data.extend_from_slice(b"HOLE");
        data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(
            NodeRecord::read(&data, 4, 4),
            Err(BankError::OutOfBounds(9, 1))
        ));
    }

    #[test]
    fn truncated_body_is_an_error() {
        let mut data = vec![0, 0, 0, 0];
        data.extend_from_slice(b"EMIT");
        data.extend_from_slice(&[0, 4]);
        assert!(matches!(
            NodeRecord::read(&data, 4, 4),
            Err(BankError::Io(_))
        ));
    }
}

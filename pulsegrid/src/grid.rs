//! The cell field and its per-pulse update.
//!
//! Cells are stored row-major in a flat arena. Node identity is positional;
//! the only link between cells is a hole's destination, which is resolved as
//! a coordinate every time it is used.

use crate::behavior::Behavior;
use crate::clock::PULSES_PER_STEP;
use crate::direction::Direction;
use crate::node::{CellView, Emitter, Hole, Node, Signal};
use crate::note::{NoteDefaults, MAX_CHANNEL};
use crate::output::Bus;
use crate::theory::{Scale, PITCH_CLASSES};
use tracing::{debug, trace};

/// A rectangle of cells, in grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Selection {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn cell(x: usize, y: usize) -> Self {
        Self::new(x, y, 1, 1)
    }

    /// Every coordinate inside the selection, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        self.slots().flatten()
    }

    /// One entry per selection cell, row by row; `None` where the
    /// coordinate would overflow.
    fn slots(&self) -> impl Iterator<Item = Option<(usize, usize)>> {
        let Selection {
            x,
            y,
            width,
            height,
        } = *self;
        (0..height).flat_map(move |dy| {
            (0..width).map(move |dx| Some((x.checked_add(dx)?, y.checked_add(dy)?)))
        })
    }
}

/// Nodes lifted out of the grid by [`Grid::copy`] or [`Grid::cut`].
#[derive(Debug, Clone, PartialEq)]
pub struct Clipboard {
    width: usize,
    height: usize,
    cells: Vec<Option<Node>>,
}

impl Clipboard {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

/// What sits in a cell, reduced to what routing decisions need. Lets the
/// update code decide without holding a borrow on the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occupant {
    Empty,
    Signal { moved: bool },
    Emitter { zone: bool, processed: bool },
    Hole,
}

pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Option<Node>>,
    pulse: u64,
    root: u8,
    scale: Scale,
    defaults: NoteDefaults,
    clipboard: Option<Clipboard>,
    bus: Bus,
}

impl Grid {
    pub fn new(width: usize, height: usize, bus: Bus) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cells: vec![None; width * height],
            pulse: 0,
            root: 0,
            scale: Scale::default(),
            defaults: NoteDefaults::default(),
            clipboard: None,
            bus,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pulse(&self) -> u64 {
        self.pulse
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn root(&self) -> u8 {
        self.root
    }

    /// Sets the root pitch class. Values above 11 are ignored.
    pub fn set_root(&mut self, root: u8) {
        if root >= PITCH_CLASSES {
            return;
        }
        self.root = root;
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Scale) {
        self.scale = scale;
    }

    /// Note values given to newly placed emitters.
    pub fn defaults(&self) -> &NoteDefaults {
        &self.defaults
    }

    pub fn set_defaults(&mut self, defaults: NoteDefaults) {
        self.defaults = defaults;
    }

    /// Channel given to newly placed emitters. Values above 15 are ignored.
    pub fn set_default_channel(&mut self, channel: u8) {
        if channel > MAX_CHANNEL {
            return;
        }
        self.defaults.channel = channel;
    }

    pub fn in_bounds(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn node(&self, x: usize, y: usize) -> Option<&Node> {
        if !self.in_bounds(x, y) {
            return None;
        }
        self.cells[self.index(x, y)].as_ref()
    }

    pub fn emitter(&self, x: usize, y: usize) -> Option<&Emitter> {
        self.node(x, y).and_then(Node::as_emitter)
    }

    pub fn emitter_mut(&mut self, x: usize, y: usize) -> Option<&mut Emitter> {
        self.node_mut(x, y).and_then(Node::as_emitter_mut)
    }

    pub fn hole(&self, x: usize, y: usize) -> Option<&Hole> {
        self.node(x, y).and_then(Node::as_hole)
    }

    pub fn hole_mut(&mut self, x: usize, y: usize) -> Option<&mut Hole> {
        self.node_mut(x, y).and_then(Node::as_hole_mut)
    }

    fn node_mut(&mut self, x: usize, y: usize) -> Option<&mut Node> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let index = self.index(x, y);
        self.cells[index].as_mut()
    }

    /// Every occupied cell as `(x, y, node)`.
    pub fn nodes(&self) -> impl Iterator<Item = (usize, usize, &Node)> + '_ {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(i, cell)| cell.as_ref().map(|node| (i % width, i / width, node)))
    }

    pub fn cell_view(&self, x: usize, y: usize) -> Option<CellView> {
        self.node(x, y).map(Node::view)
    }

    // ---- editing ----

    /// Places `node` at `(x, y)`, replacing (and silencing) whatever was
    /// there. Returns false if the cell is out of bounds.
    pub fn insert(&mut self, x: usize, y: usize, mut node: Node) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        if let Node::Hole(hole) = &mut node {
            hole.set_origin((x, y));
        }
        self.remove(x, y);
        let index = self.index(x, y);
        self.cells[index] = Some(node);
        true
    }

    /// Places a new emitter seeded from the grid defaults.
    pub fn add_emitter(
        &mut self,
        x: usize,
        y: usize,
        behavior: Behavior,
        directions: Direction,
    ) -> Option<&mut Emitter> {
        let emitter = Emitter::new(behavior, directions, &self.defaults);
        if !self.insert(x, y, emitter.into()) {
            return None;
        }
        self.emitter_mut(x, y)
    }

    /// Places a new hole teleporting to `dest`.
    pub fn add_hole(&mut self, x: usize, y: usize, dest: (i32, i32)) -> Option<&mut Hole> {
        let hole = Hole::new((x, y), dest, self.width, self.height);
        if !self.insert(x, y, hole.into()) {
            return None;
        }
        self.hole_mut(x, y)
    }

    /// Takes the node out of a cell, stopping its note.
    pub fn remove(&mut self, x: usize, y: usize) -> Option<Node> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let index = self.index(x, y);
        let mut node = self.cells[index].take()?;
        node.stop(&self.bus);
        Some(node)
    }

    pub fn remove_selection(&mut self, selection: Selection) {
        for (x, y) in selection.cells() {
            self.remove(x, y);
        }
    }

    /// Flips an emitter's mute flag, silencing it when muting. Returns the
    /// new state, or `None` if there is no emitter there.
    pub fn toggle_mute(&mut self, x: usize, y: usize) -> Option<bool> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let index = self.index(x, y);
        let emitter = match &mut self.cells[index] {
            Some(Node::Emitter(emitter)) => emitter,
            _ => return None,
        };
        emitter.muted = !emitter.muted;
        if emitter.muted {
            emitter.note.stop(&self.bus);
        }
        Some(emitter.muted)
    }

    /// Activates an emitter by hand, as if a signal with no direction had
    /// reached it.
    pub fn trigger(&mut self, x: usize, y: usize) -> bool {
        if self.emitter(x, y).is_none() {
            return false;
        }
        self.activate(x, y, Direction::NONE);
        self.release_stamps();
        true
    }

    /// Between updates `pulse` already names the next pulse to run. Anything
    /// stamped with it by an edit would sit out that pulse, so clear those
    /// stamps.
    fn release_stamps(&mut self) {
        let pulse = Some(self.pulse);
        for node in self.cells.iter_mut().flatten() {
            match node {
                Node::Signal(signal) if signal.last_moved == pulse => signal.last_moved = None,
                Node::Emitter(emitter) if emitter.last_processed == pulse => {
                    emitter.last_processed = None
                }
                _ => {}
            }
        }
    }

    /// Changes the grid size. Nodes outside the new bounds are dropped and
    /// silenced; the rest keep their coordinates.
    pub fn resize(&mut self, width: usize, height: usize) {
        let width = width.max(1);
        let height = height.max(1);
        let mut cells = vec![None; width * height];
        for (i, cell) in self.cells.iter_mut().enumerate() {
            let (x, y) = (i % self.width, i / self.width);
            if let Some(mut node) = cell.take() {
                if x < width && y < height {
                    cells[y * width + x] = Some(node);
                } else {
                    node.stop(&self.bus);
                }
            }
        }
        debug!(
            from = ?(self.width, self.height),
            to = ?(width, height),
            "grid resized"
        );
        self.width = width;
        self.height = height;
        self.cells = cells;
    }

    /// Copies the selection to the clipboard. Travelling signals are left
    /// out.
    pub fn copy(&mut self, selection: Selection) {
        let cells = selection
            .slots()
            .map(|slot| {
                slot.and_then(|(x, y)| self.node(x, y))
                    .and_then(Node::duplicate)
            })
            .collect();
        self.clipboard = Some(Clipboard {
            width: selection.width,
            height: selection.height,
            cells,
        });
    }

    pub fn cut(&mut self, selection: Selection) {
        self.copy(selection);
        self.remove_selection(selection);
    }

    /// Pastes the clipboard with its top-left corner at `(x, y)`. Cells that
    /// fall outside the grid are skipped; empty clipboard cells leave the
    /// grid untouched.
    pub fn paste(&mut self, x: usize, y: usize) -> bool {
        let clipboard = match self.clipboard.take() {
            Some(clipboard) => clipboard,
            None => return false,
        };
        for (i, cell) in clipboard.cells.iter().enumerate() {
            let node = match cell.as_ref().and_then(Node::duplicate) {
                Some(node) => node,
                None => continue,
            };
            let target = x
                .checked_add(i % clipboard.width)
                .zip(y.checked_add(i / clipboard.width));
            if let Some((tx, ty)) = target {
                self.insert(tx, ty, node);
            }
        }
        self.clipboard = Some(clipboard);
        true
    }

    pub fn clipboard(&self) -> Option<&Clipboard> {
        self.clipboard.as_ref()
    }

    /// Removes every node.
    pub fn clear(&mut self) {
        self.silence();
        for cell in self.cells.iter_mut() {
            *cell = None;
        }
    }

    /// Sends a note-off for every sounding note.
    pub fn silence(&mut self) {
        for node in self.cells.iter_mut().flatten() {
            node.stop(&self.bus);
        }
    }

    /// Back to pulse zero: notes stopped, signals gone, emitters re-armed as
    /// when placed.
    pub fn rewind(&mut self) {
        for cell in self.cells.iter_mut() {
            if let Some(Node::Signal(_)) = cell {
                *cell = None;
                continue;
            }
            match cell {
                Some(Node::Emitter(emitter)) => emitter.rewind(&self.bus),
                Some(Node::Hole(hole)) => hole.deactivate(),
                _ => {}
            }
        }
        self.pulse = 0;
    }

    // ---- simulation ----

    /// Advances one pulse. Every pulse ticks note lengths; every fourth pulse
    /// also moves signals and fires emitters.
    pub fn update(&mut self) {
        self.tick();
        if self.pulse % PULSES_PER_STEP == 0 {
            self.step();
        }
        self.pulse += 1;
    }

    /// Advances every note length and hole activation window by one pulse.
    pub fn tick(&mut self) {
        for node in self.cells.iter_mut().flatten() {
            node.tick(&self.bus);
        }
    }

    /// Bottom-up, right-to-left, so anything that moves forward in the scan
    /// lands on a cell that was already visited and carries this pulse's
    /// stamp anyway.
    fn step(&mut self) {
        for y in (0..self.height).rev() {
            for x in (0..self.width).rev() {
                match self.occupant(x, y) {
                    Occupant::Signal { moved: false } => self.move_signal(x, y),
                    Occupant::Emitter {
                        processed: false, ..
                    } => self.step_emitter(x, y),
                    _ => {}
                }
            }
        }
    }

    fn occupant(&self, x: usize, y: usize) -> Occupant {
        match &self.cells[self.index(x, y)] {
            None => Occupant::Empty,
            Some(Node::Signal(signal)) => Occupant::Signal {
                moved: signal.moved_at(self.pulse),
            },
            Some(Node::Emitter(emitter)) => Occupant::Emitter {
                zone: emitter.behavior.is_zone(),
                processed: emitter.processed_at(self.pulse),
            },
            Some(Node::Hole(_)) => Occupant::Hole,
        }
    }

    fn neighbor(&self, x: usize, y: usize, dx: isize, dy: isize) -> Option<(usize, usize)> {
        if dx == 0 && dy == 0 {
            return None;
        }
        let nx = x as isize + dx;
        let ny = y as isize + dy;
        if nx < 0 || ny < 0 || nx as usize >= self.width || ny as usize >= self.height {
            return None;
        }
        Some((nx as usize, ny as usize))
    }

    fn step_emitter(&mut self, x: usize, y: usize) {
        let index = self.index(x, y);
        let (root, scale, pulse) = (self.root, self.scale, self.pulse);
        let flood = match &mut self.cells[index] {
            Some(Node::Emitter(emitter)) if emitter.is_armed() => {
                if emitter.behavior.is_zone() {
                    true
                } else {
                    emitter.trigger(root, scale, pulse, &self.bus);
                    false
                }
            }
            _ => false,
        };
        if flood {
            self.flood(x, y);
        }
        self.emit(x, y);
    }

    /// Sends a triggered emitter's signals to its neighbours.
    fn emit(&mut self, x: usize, y: usize) {
        let index = self.index(x, y);
        let pulse = self.pulse;
        let directions = match &mut self.cells[index] {
            Some(Node::Emitter(emitter)) if emitter.is_triggered() => emitter.take_emission(pulse),
            _ => return,
        };
        for direction in directions.decompose() {
            let (dx, dy) = direction.delta();
            if let Some((nx, ny)) = self.neighbor(x, y, dx, dy) {
                self.deliver(nx, ny, Signal::new(direction), &mut Vec::new());
            }
        }
    }

    fn move_signal(&mut self, x: usize, y: usize) {
        let index = self.index(x, y);
        let signal = match self.cells[index].take() {
            Some(Node::Signal(signal)) => signal,
            other => {
                self.cells[index] = other;
                return;
            }
        };
        let (dx, dy) = signal.direction().delta();
        match self.neighbor(x, y, dx, dy) {
            Some((nx, ny)) => self.deliver(nx, ny, signal, &mut Vec::new()),
            None => trace!(x, y, "signal left the grid"),
        }
    }

    /// Routes a signal arriving at `(x, y)`. `holes` lists the holes this
    /// signal already passed through on the current hop.
    fn deliver(&mut self, x: usize, y: usize, signal: Signal, holes: &mut Vec<(usize, usize)>) {
        match self.occupant(x, y) {
            Occupant::Emitter { .. } => self.activate(x, y, signal.direction()),
            Occupant::Hole => self.teleport(x, y, signal, holes),
            Occupant::Signal { moved } => {
                if !moved {
                    self.move_signal(x, y);
                }
                self.place(x, y, signal);
            }
            Occupant::Empty => self.place(x, y, signal),
        }
    }

    /// Leaves a signal in an empty cell. A signal meeting one that already
    /// settled here this pulse merges into it.
    fn place(&mut self, x: usize, y: usize, mut signal: Signal) {
        let index = self.index(x, y);
        if self.cells[index].is_some() {
            trace!(x, y, "signals merged");
            return;
        }
        signal.last_moved = Some(self.pulse);
        self.cells[index] = Some(Node::Signal(signal));
    }

    /// A signal reached an emitter: arm it and fire it now, unless it
    /// already had its turn this pulse, in which case it fires next step.
    /// An emission still pending from the last trigger goes out first.
    fn activate(&mut self, x: usize, y: usize, incoming: Direction) {
        let (zone, processed) = match self.occupant(x, y) {
            Occupant::Emitter { zone, processed } => (zone, processed),
            _ => return,
        };
        if zone && !processed {
            self.flood(x, y);
        } else if processed {
            if let Some(emitter) = self.emitter_mut(x, y) {
                emitter.arm(incoming);
            }
        } else {
            self.emit(x, y);
            self.arm_and_trigger(x, y, incoming);
        }
    }

    fn arm_and_trigger(&mut self, x: usize, y: usize, incoming: Direction) {
        let index = self.index(x, y);
        let (root, scale, pulse) = (self.root, self.scale, self.pulse);
        if let Some(Node::Emitter(emitter)) = &mut self.cells[index] {
            emitter.arm(incoming);
            emitter.trigger(root, scale, pulse, &self.bus);
        }
    }

    /// Zone activation: every connected zone fires, and every emitter or hole
    /// touching one of them (diagonals included) is hit once.
    fn flood(&mut self, x: usize, y: usize) {
        let mut visited = vec![false; self.cells.len()];
        let mut stack = vec![(x, y)];
        visited[self.index(x, y)] = true;

        while let Some((zx, zy)) = stack.pop() {
            self.arm_and_trigger(zx, zy, Direction::NONE);
            for dy in -1..=1isize {
                for dx in -1..=1isize {
                    let (nx, ny) = match self.neighbor(zx, zy, dx, dy) {
                        Some(cell) => cell,
                        None => continue,
                    };
                    let index = self.index(nx, ny);
                    if visited[index] {
                        continue;
                    }
                    match self.occupant(nx, ny) {
                        Occupant::Emitter {
                            processed: true, ..
                        } => {}
                        Occupant::Emitter { zone: true, .. } => {
                            visited[index] = true;
                            stack.push((nx, ny));
                        }
                        Occupant::Emitter { zone: false, .. } => {
                            visited[index] = true;
                            self.emit(nx, ny);
                            self.arm_and_trigger(nx, ny, Direction::from_delta(dx, dy));
                        }
                        Occupant::Hole => {
                            visited[index] = true;
                            let signal = Signal::new(Direction::from_delta(dx, dy));
                            self.teleport(nx, ny, signal, &mut Vec::new());
                        }
                        Occupant::Signal { .. } | Occupant::Empty => {}
                    }
                }
            }
        }
    }

    /// Hands `signal` to whatever sits at the hole's destination.
    fn teleport(&mut self, x: usize, y: usize, signal: Signal, holes: &mut Vec<(usize, usize)>) {
        if holes.contains(&(x, y)) {
            debug!(x, y, "hole chain loops back, signal dropped");
            return;
        }
        holes.push((x, y));

        let (width, height) = (self.width as i32, self.height as i32);
        let index = self.index(x, y);
        let hole = match &mut self.cells[index] {
            Some(Node::Hole(hole)) => hole,
            _ => return,
        };
        let (dx, dy) = hole.destination();
        if (dx, dy) == (x as i32, y as i32) {
            return;
        }
        if dx < 0 || dy < 0 || dx >= width || dy >= height {
            trace!(x, y, dx, dy, "hole points off the grid, signal dropped");
            return;
        }
        hole.activate();
        self.deliver(dx as usize, dy as usize, signal, holes);
    }
}

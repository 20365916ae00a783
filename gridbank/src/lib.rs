//! Bank files: one grid saved as a chunked big-endian binary.
//!
//! ```text
//! FORM <size> PGRD
//!   HEAD <size> version width height root scale tempo default-channel
//!   NODE <size> x y EMIT|HOLE <body>
//!   NODE ...
//! ```
//!
//! A NODE chunk that cannot be understood is logged and skipped; the rest of
//! the bank still loads.

pub mod error;
pub use error::{BankError, Result};
pub mod types;
use types::*;
mod chunks;
pub use chunks::head::{Header, VERSION};
pub use chunks::node::NodeRecord;

use pulsegrid::{Bus, Grid, Node};
use std::convert::TryFrom;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const FORM: ID = ID::new(*b"FORM");
const FORM_TYPE: ID = ID::new(*b"PGRD");
const HEAD: ID = ID::new(*b"HEAD");
const NODE: ID = ID::new(*b"NODE");

/// Everything needed to rebuild a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub header: Header,
    pub nodes: Vec<NodeRecord>,
}

impl Snapshot {
    /// Copies the persistent part of `grid`. Travelling signals and sounding
    /// notes are not part of it.
    pub fn capture(grid: &Grid, tempo: u16) -> Self {
        let header = Header {
            width: u16::try_from(grid.width()).unwrap_or(u16::MAX),
            height: u16::try_from(grid.height()).unwrap_or(u16::MAX),
            root: grid.root(),
            scale: grid.scale(),
            tempo,
            default_channel: grid.defaults().channel,
        };
        let nodes = grid
            .nodes()
            .filter_map(|(x, y, node)| {
                Some(NodeRecord {
                    x: u16::try_from(x).ok()?,
                    y: u16::try_from(y).ok()?,
                    node: node.duplicate()?,
                })
            })
            .collect();
        Self { header, nodes }
    }

    /// Builds a fresh grid sending to `bus`.
    pub fn restore(&self, bus: Bus) -> Grid {
        let header = &self.header;
        let mut grid = Grid::new(usize::from(header.width), usize::from(header.height), bus);
        grid.set_root(header.root);
        grid.set_scale(header.scale);
        grid.set_default_channel(header.default_channel);
        for record in &self.nodes {
            let placed = grid.insert(
                usize::from(record.x),
                usize::from(record.y),
                record.node.clone(),
            );
            if !placed {
                warn!(x = record.x, y = record.y, "node outside the grid, skipped");
            }
        }
        grid
    }

    pub fn read(data: &[u8]) -> Result<Self> {
        let mut data = data;
        let (form_id, form_data) = read_chunk(&mut data)?;
        if form_id != FORM || form_data.len() < 4 {
            return Err(BankError::InvalidFormat);
        }
        let form_type = ID::try_from(&form_data[0..4])?;
        if form_type != FORM_TYPE {
            return Err(BankError::InvalidFormType);
        }

        let mut header = None;
        let mut pending = Vec::new();

        let mut data = &form_data[4..];
        while !data.is_empty() {
            let (chunk_id, chunk_data) = read_chunk(&mut data)?;
            match chunk_id.data() {
                b"HEAD" => header = Some(Header::read(chunk_data)?),
                b"NODE" => pending.push(chunk_data),
                _ => debug!(chunk = %chunk_id, "ignoring unknown chunk"),
            }
        }
        let header = header.ok_or(BankError::MissingHead)?;

        let mut nodes = Vec::with_capacity(pending.len());
        for chunk_data in pending {
            match NodeRecord::read(chunk_data, header.width, header.height) {
                Ok(record) => nodes.push(record),
                Err(err) => warn!("skipping node: {}", err),
            }
        }

        Ok(Self { header, nodes })
    }

    pub fn write(&self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        body.extend_from_slice(FORM_TYPE.data());

        let mut head = Vec::new();
        self.header.write(&mut head)?;
        write_chunk(&mut body, HEAD, &head)?;
        for record in &self.nodes {
            record.write(&mut body)?;
        }

        let mut out = Vec::with_capacity(body.len() + 8);
        write_chunk(&mut out, FORM, &body)?;
        Ok(out)
    }

    pub fn emitter_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|record| matches!(record.node, Node::Emitter(_)))
            .count()
    }
}

pub fn load(path: &Path) -> Result<Snapshot> {
    let data = fs::read(path)?;
    let snapshot = Snapshot::read(&data)?;
    debug!(path = %path.display(), nodes = snapshot.nodes.len(), "bank loaded");
    Ok(snapshot)
}

pub fn save(path: &Path, snapshot: &Snapshot) -> Result<()> {
    fs::write(path, snapshot.write()?)?;
    debug!(path = %path.display(), nodes = snapshot.nodes.len(), "bank saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_foreign_forms() {
        let mut out = Vec::new();
        write_chunk(&mut out, FORM, b"AIFF").unwrap();
        assert!(matches!(
            Snapshot::read(&out),
            Err(BankError::InvalidFormType)
        ));

        let mut out = Vec::new();
        write_chunk(&mut out, ID::new(*b"LIST"), b"PGRD").unwrap();
        assert!(matches!(Snapshot::read(&out), Err(BankError::InvalidFormat)));
    }

    #[test]
    fn header_is_required() {
        let mut out = Vec::new();
        write_chunk(&mut out, FORM, b"PGRD").unwrap();
        assert!(matches!(Snapshot::read(&out), Err(BankError::MissingHead)));
    }
}

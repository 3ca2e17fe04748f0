use crate::core::error::Result;
use crate::core::models::topology::Topology;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing topology file formats.
///
/// Implementors handle format-specific parsing and serialization; the
/// provided methods wrap them in buffered file handles.
pub trait TopologyFile {
    /// Reads a topology from a buffered reader, in file order.
    fn read_from(reader: &mut impl BufRead) -> Result<Topology>;

    /// Writes a topology, renumbering serials sequentially.
    fn write_to(topology: &Topology, writer: &mut impl Write) -> Result<()>;

    /// Reads a topology from a file path.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Topology> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes a topology to a file path.
    fn write_to_path<P: AsRef<Path>>(topology: &Topology, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(topology, &mut writer)
    }
}

//! Provides input/output functionality for topology file formats.
//!
//! Two on-disk representations are supported: the fixed-column format with
//! hexadecimal-overflow serial numbering ([`pdb`]) and the tag-based columnar
//! format with declared column sets ([`cif`]). Both populate the same
//! [`crate::core::models::topology::Topology`] in file order through the
//! unified [`traits::TopologyFile`] interface.

pub mod cif;
pub mod pdb;
pub mod traits;

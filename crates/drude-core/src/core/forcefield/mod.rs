//! # Force Field Module
//!
//! Everything DRUDE++ knows about the hierarchical force-field description:
//! the document tree itself, the polarizability parameter table, and the
//! transform that grafts Drude particle types, springs, and polarization
//! records onto a loaded document.
//!
//! ## Key Components
//!
//! - [`document`] - Generic element tree with load/serialize plus typed
//!   accessors over the force-field schema (atom types, residue templates)
//! - [`table`] - The per-type polarizability table and the physically derived
//!   displaced charges
//! - [`transform`] - The polarization pass producing a new, augmented document

pub mod document;
pub mod table;
pub mod transform;

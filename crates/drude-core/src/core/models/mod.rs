//! # Core Models Module
//!
//! Data structures representing the molecular topology that is being
//! polarized: atoms, positional bonds, and the topology container with its
//! annotation and Drude-insertion passes.
//!
//! ## Key Components
//!
//! - [`atom`] - Individual atom representation with coordinates, element, and
//!   force-field annotations
//! - [`topology`] - The ordered atom/bond sequences, the staged annotation
//!   pipeline, and the auxiliary-particle insertion algorithm

pub mod atom;
pub mod topology;

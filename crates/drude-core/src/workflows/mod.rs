//! # Workflows Module
//!
//! High-level entry points for users of DRUDE++. Each workflow encapsulates a
//! complete batch procedure from input files to output files, including the
//! stage ordering that the core types require.
//!
//! - **Polarization Workflow** ([`polarize`]) - The one-shot
//!   load → annotate → transform → insert → write pipeline.

pub mod polarize;

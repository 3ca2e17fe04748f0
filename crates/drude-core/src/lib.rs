//! # DRUDE++ Core Library
//!
//! A library for augmenting non-polarizable molecular-mechanics models with
//! Drude charge-on-spring particles representing induced dipoles, for classical
//! molecular dynamics.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict two-layer architecture to ensure a clear
//! separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models ([`core::models`]),
//!   the fixed-width serial-number codec ([`core::codec`]), structural file I/O
//!   ([`core::io`]), and the force-field document, polarization table, and
//!   transform ([`core::forcefield`]).
//!
//! - **[`workflows`]: The Public API.** The highest-level, user-facing layer. It
//!   ties the core stages together into the one-shot polarization pipeline and is
//!   the only place the full load → annotate → transform → insert → write
//!   sequence is expressed, in the only order in which it is valid.

pub mod core;
pub mod workflows;

//! # Cast Rules
//!
//! The "cast sheet" crate - contains character identity, personality traits,
//! the active roster, and the closed vocabularies (interaction types, emotions)
//! shared by the orchestration engine. This crate holds data only and does not
//! make any selection or scheduling decisions.

pub mod entities;
pub mod mechanics;
pub mod roster;

pub use entities::*;
pub use mechanics::*;
pub use roster::*;

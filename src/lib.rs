//! ComfoConnect select bridge library.
//!
//! Exposes the bypass and temperature profile modes of a Zehnder ComfoAir
//! unit as select entities, kept in sync with sensor pushes from the unit.

pub mod config;
pub mod device;
pub mod error;
pub mod mqtt;
pub mod select;
pub mod simulation;
pub mod updates;

//! Domain types for deferred tag replay.

pub mod tags;

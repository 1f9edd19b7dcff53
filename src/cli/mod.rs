//! Command-line interface over .nstate snapshots.

pub mod commands;

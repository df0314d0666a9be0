//! Small helpers shared across the workspace crates.

pub mod uuid;

//! CLI command implementations.

pub mod check;
pub mod common;
pub mod compile;
pub mod editor;
pub mod host;
pub mod objects;

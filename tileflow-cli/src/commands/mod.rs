//! CLI command implementations.
//!
//! - [`pyramid`] - Print the desired tile set for a view
//! - [`simulate`] - Load a view through a source with a simulated render loop

pub mod common;
pub mod pyramid;
pub mod simulate;

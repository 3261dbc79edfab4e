//! Commands behind the `recall` binary.
pub mod commands;
pub mod state;

pub use commands::App;

//! Request handlers for export and import.

mod export;
mod import;

pub use export::*;
pub use import::*;

//! Components shared by unit tests across modules
mod common;
mod notifier;

pub use common::*;
pub use notifier::*;

//! Registry data as seen by the compatibility layer
mod instance;
mod resource;
mod view;

pub use instance::*;
pub use resource::*;
pub use view::*;

#[cfg(test)]
mod model_test;

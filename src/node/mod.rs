mod builder;
mod node;

#[cfg(test)]
mod node_test;

pub use builder::*;
pub use node::*;

//! Node controller module.

pub mod node;

pub use node::{Node, NodeCommand};

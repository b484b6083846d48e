// src/dag/mod.rs

//! Task graph representation.
//!
//! - [`graph`] holds the DAG itself: nodes, edges, validation.
//! - [`taskflow`] owns a graph and shares it with runs, guarding mutation.
//! - [`work`] defines the closed set of payload kinds a node can carry.

pub mod graph;
pub mod taskflow;
pub mod work;

pub use graph::{Graph, GraphId, Node, TaskId};
pub use taskflow::Taskflow;
pub use work::{TaskOutcome, Work};

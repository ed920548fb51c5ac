//! Tessera Core
//!
//! This crate provides the IR graph engine of the Tessera neural-network
//! compiler. It implements:
//!
//! - An operator graph with intrusive node sequence and fan-in/fan-out chains
//! - Cascading structural mutation that keeps every view consistent
//! - A stable topological sort
//! - Sequential, depth-first, and breadth-first traversal
//!
//! The engine carries structure only. It does not evaluate operators or
//! check their semantics.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `arena`: Generational storage and typed handles
//! - `module`: The value namespace that graphs borrow
//! - `graph`: Nodes, arcs, mutation, traversal, and sorting
//! - `config`: Graph tunables
//!
//! # Example
//!
//! ```rust
//! use tessera_core::graph::ComputeGraph;
//! use tessera_core::module::Module;
//!
//! let mut module = Module::new();
//! let mut graph = ComputeGraph::new("main", &mut module);
//!
//! let relu = graph.add_node("Relu", 1);
//! let input = graph.add_node("Input", 0);
//! graph.add_output(input, "x").unwrap();
//! graph.add_output(relu, "y").unwrap();
//! graph.connect(input, 0, relu, 0).unwrap();
//!
//! graph.topological_sort().unwrap();
//! let order: Vec<_> = graph.iter().map(|(_, node)| node.kind()).collect();
//! assert_eq!(order, ["Input", "Relu"]);
//! ```

pub mod arena;
pub mod config;
pub mod error;
pub mod graph;
pub mod module;

pub use config::GraphConfig;
pub use error::{Error, Result};
pub use graph::{ArcId, ComputeGraph, NodeId};
pub use module::{Module, ValueId};

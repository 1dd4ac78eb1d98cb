//! Differentiable compute over tensors and graphs.
//! Small. CPU only. Built for concurrent ingestion.
//!
//! # Features
//!
//! - **Reverse-mode autodiff** — 2-D tensors record the operations
//! that created them; [backward](Tensor::backward) walks the DAG in
//! reverse-topological order and accumulates gradients.
//!
//! - **Zero-copy views** — transposes and snapshot weight views share
//! storage through strides instead of copying. Aliased buffers stay
//! mutually observable.
//!
//! - **Broadcasting** — operands with a singleton dimension expand to
//! match without allocating; gradients sum-reduce back automatically.
//!
//! - **Concurrent graph store** — string-keyed nodes with per-node
//! monitors, deadlock-free edge accumulation under ordered locking,
//! and parallel scans over an injected worker pool.
//!
//! - **CSR snapshots** — the mutable graph compiles into deterministic
//! Compressed Sparse Row arrays whose weight buffer *is* tensor
//! storage, feeding parallel connected components, decay and a
//! byte-exact persisted format with a SHA-256 topology fingerprint.
//!
//! # Examples
//!
//! Differentiating a small expression:
//! ```
//! use gradforge::Tensor;
//!
//! let a = Tensor::new(1, 2, vec![2.0, 3.0])?;
//! let b = Tensor::new(2, 1, vec![4.0, 5.0])?;
//! let c = a.matmul(&b)?;
//!
//! c.backward();
//! assert_eq!(c.data(), vec![23.0]);
//! assert_eq!(a.grad(), vec![4.0, 5.0]);
//! # Ok::<(), gradforge::Error>(())
//! ```
//!
//! Compiling a graph and splitting it on weak edges:
//! ```
//! use gradforge::{ Graph, Workers, parallel_components_where };
//!
//! let graph: Graph<f32> = Graph::new();
//! for id in ["a", "b", "c", "d"] {
//!   graph.get_or_add_node(id, ())?;
//! }
//! graph.accumulate_edge("a", "b", 1.0, 0)?;
//! graph.accumulate_edge("c", "d", 1.0, 0)?;
//! graph.accumulate_edge("b", "c", 0.05, 0)?;
//!
//! let csr = graph.compile_csr();
//! let workers = Workers::hardware()?;
//! let islands = parallel_components_where(&csr, &workers, |_, w| w > 0.1 );
//! assert_eq!(islands.len(), 2);
//! # Ok::<(), gradforge::Error>(())
//! ```
//!
//! ## More examples
//! Check the `/demos` folder for runnable example code.

mod internal;
mod error;
mod shape;
mod storage;
mod tensor;
mod graph;
mod workers;

pub mod scalar;
pub mod hash;
pub mod metric;

pub use error::{ Error, Result };
pub use shape::Shape;
pub use storage::Storage;
pub use tensor::Tensor;
pub use workers::Workers;
pub use graph::{
  Graph, GraphNode, Edge, CsrSnapshot,
  parallel_components, parallel_components_where,
  bfs_components, bfs_components_where,
};

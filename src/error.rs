use thiserror::Error;


pub type Result<T> = std::result::Result<T, Error>;


/// Everything that can go wrong across the tensor engine,
/// the graph store and snapshot persistence.

#[derive(Error, Debug)]
pub enum Error {
  #[error("shape mismatch: {0}")]
  ShapeMismatch(String),

  #[error("cannot broadcast {lhs:?} with {rhs:?}")]
  BroadcastIncompatible { lhs: (usize, usize), rhs: (usize, usize) },

  #[error("node {0:?} does not exist")]
  NodeMissing(String),

  #[error("invalid node id {0:?}")]
  InvalidId(String),

  #[error("dimension mismatch: {lhs} vs {rhs}")]
  DimensionMismatch { lhs: usize, rhs: usize },

  #[error("invalid snapshot magic {0:#010x}")]
  InvalidMagic(u32),

  #[error("unsupported snapshot version {0}")]
  UnsupportedVersion(u32),

  #[error("worker pool: {0}")]
  Pool(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

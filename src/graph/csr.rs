use std::collections::HashMap;
use std::ops::Range;

use itertools::Itertools;
use rayon::prelude::*;

use crate::{
  internal::*,
  hash,
  shape::Shape,
  storage::Storage,
  scalar::Real,
  tensor::Tensor,
  workers::Workers,
};

use super::{ Graph, GraphNode };


/// An immutable Compressed Sparse Row projection of a [Graph].
///
/// Node `i`'s outgoing edges live at `col_idx[row_ptr[i]..row_ptr[i+1]]`
/// with parallel weight and timestamp entries. Nodes are indexed by
/// ascending id and each edge slice is sorted by target id, so two
/// structurally equal graphs compile to byte-identical arrays.
///
/// The weight array is tensor storage: [weights_as_tensor](CsrSnapshot::weights_as_tensor)
/// views it without copying, and writes on either side are observable
/// through the other.

#[derive(Debug)]
pub struct CsrSnapshot<T: Real> {
  pub(crate) row_ptr: Vec<u32>,
  pub(crate) col_idx: Vec<u32>,
  pub(crate) weights: Storage<T>,
  pub(crate) last_modified: Vec<i64>,
  pub(crate) id_to_index: HashMap<String, u32>,
  pub(crate) index_to_id: Vec<String>,
}

impl<T: Real, D: Send + Sync> Graph<T, D> {
  /// Compile a deterministic point-in-time snapshot.
  ///
  /// Not synchronized with ongoing mutation; quiesce ingestion first.

  pub fn compile_csr(&self) -> CsrSnapshot<T> {
    let nodes: Vec<RcT<GraphNode<T, D>>> = self.handles()
      .into_iter()
      .sorted_by(|a, b| a.id.cmp(&b.id) )
      .collect();

    let index_to_id: Vec<String> = nodes.iter().map(|node| node.id.clone() ).collect();
    let id_to_index: HashMap<String, u32> = index_to_id.iter()
      .enumerate()
      .map(|(index, id)| (id.clone(), index as u32) )
      .collect();

    let mut row_ptr = Vec::with_capacity(nodes.len() + 1);
    let mut col_idx = vec![];
    let mut weights = vec![];
    let mut last_modified = vec![];

    row_ptr.push(0);
    for node in &nodes {
      let edges = node.edges.lock();
      for (target, edge) in edges.iter() {
        // Ascending target order comes from the edge map's key order
        let Some(&index) = id_to_index.get(target) else { continue };
        col_idx.push(index);
        weights.push(edge.weight);
        last_modified.push(edge.last_modified);
      }
      row_ptr.push(col_idx.len() as u32);
    }

    CsrSnapshot {
      row_ptr,
      col_idx,
      weights: Storage::from_vec(weights),
      last_modified,
      id_to_index,
      index_to_id,
    }
  }
}

impl<T: Real> CsrSnapshot<T> {
  pub fn node_count(&self) -> usize {
    self.index_to_id.len()
  }

  pub fn edge_count(&self) -> usize {
    self.col_idx.len()
  }

  pub fn row_ptr(&self) -> &[u32] {
    &self.row_ptr
  }

  pub fn col_idx(&self) -> &[u32] {
    &self.col_idx
  }

  pub fn last_modified(&self) -> &[i64] {
    &self.last_modified
  }

  pub fn index_of(&self, id: &str) -> Option<u32> {
    self.id_to_index.get(id).copied()
  }

  pub fn id_of(&self, index: u32) -> &str {
    &self.index_to_id[index as usize]
  }

  /// Positions of node `index`'s edge slice in the parallel arrays.

  pub fn edge_range(&self, index: u32) -> Range<usize> {
    self.row_ptr[index as usize] as usize..self.row_ptr[index as usize + 1] as usize
  }

  /// Target indices of node `index`'s outgoing edges.

  pub fn targets(&self, index: u32) -> &[u32] {
    &self.col_idx[self.edge_range(index)]
  }

  pub fn weight(&self, edge: usize) -> T {
    self.weights.data()[edge]
  }

  pub fn set_weight(&self, edge: usize, weight: T) {
    self.weights.data_mut()[edge] = weight;
  }

  /// Snapshot of all edge weights.

  pub fn weights_vec(&self) -> Vec<T> {
    self.weights.data().clone()
  }

  /// A `[1, edge_count]` leaf tensor aliasing the weight buffer.
  /// Writes through the tensor are visible to snapshot readers and
  /// vice versa.

  pub fn weights_as_tensor(&self) -> Tensor<T> {
    Tensor::view(Shape::new(1, self.edge_count()), self.weights.clone())
  }

  /// Decay every edge weight by its age, in parallel:
  /// `w ← w · exp(-λ · age_days)` with
  /// `age_days = max(0, (now − last_modified) / 86 400)`.

  pub fn apply_decay(&self, lambda: T, now: i64, workers: &Workers) {
    let day = T::from(86_400).unwrap();
    let mut guard = self.weights.data_mut();
    let weights: &mut [T] = &mut guard;
    let stamps = &self.last_modified;
    workers.install(|| {
      weights.par_iter_mut()
        .zip(stamps.par_iter())
        .for_each(|(weight, &stamp)| {
          let age_days = T::from(now - stamp).unwrap() / day;
          *weight = decayed(*weight, lambda, age_days);
        });
    });
  }

  /// SHA-256 fingerprint of the snapshot structure: the little-endian
  /// bytes of `row_ptr`, `col_idx` and the weights as IEEE-754
  /// binary32, in that order.

  pub fn topology_hash(&self) -> [u8; 32] {
    let mut rows = Vec::with_capacity(self.row_ptr.len() * 4);
    for value in &self.row_ptr {
      rows.extend_from_slice(&value.to_le_bytes());
    }
    let mut cols = Vec::with_capacity(self.col_idx.len() * 4);
    for value in &self.col_idx {
      cols.extend_from_slice(&value.to_le_bytes());
    }
    let weights = self.weights.data();
    let mut packed = Vec::with_capacity(weights.len() * 4);
    for &weight in weights.iter() {
      let weight: f32 = num_traits::NumCast::from(weight).unwrap();
      packed.extend_from_slice(&weight.to_le_bytes());
    }
    hash::sha256_concat3(&rows, &cols, &packed)
  }

  /// The topology hash as uppercase hex.

  pub fn topology_hex(&self) -> String {
    hash::to_hex_upper(&self.topology_hash())
  }
}

use std::collections::VecDeque;
use std::sync::atomic::{ AtomicU32, Ordering };

use dashmap::DashMap;
use itertools::Itertools;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::{
  scalar::Real,
  workers::Workers,
};

use super::csr::CsrSnapshot;


/// Concurrent disjoint-set forest over snapshot indices.
///
/// `find` runs without locks: path-splitting writes only ever point a
/// node at one of its ancestors, which keeps the forest intact under
/// races. Root changes happen exclusively under the two root
/// monitors, taken in ascending index order.

struct DisjointSet {
  parent: Vec<AtomicU32>,
  rank: Vec<AtomicU32>,
  locks: Vec<Mutex<()>>,
}

impl DisjointSet {
  fn new(len: usize) -> Self {
    Self {
      parent: (0..len as u32).map(AtomicU32::new).collect(),
      rank: (0..len).map(|_| AtomicU32::new(0) ).collect(),
      locks: (0..len).map(|_| Mutex::new(()) ).collect(),
    }
  }

  fn find(&self, mut i: u32) -> u32 {
    loop {
      let parent = self.parent[i as usize].load(Ordering::Relaxed);
      if parent == i { return i }
      let grandparent = self.parent[parent as usize].load(Ordering::Relaxed);
      self.parent[i as usize].store(grandparent, Ordering::Relaxed);
      i = parent;
    }
  }

  fn union(&self, u: u32, v: u32) {
    loop {
      let ru = self.find(u);
      let rv = self.find(v);
      if ru == rv { return }

      let (first, second) = if ru < rv { (ru, rv) } else { (rv, ru) };
      let _first = self.locks[first as usize].lock();
      let _second = self.locks[second as usize].lock();

      // A concurrent union may have dethroned either root; start over
      if self.parent[ru as usize].load(Ordering::Relaxed) != ru
        || self.parent[rv as usize].load(Ordering::Relaxed) != rv {
        continue;
      }

      let rank_u = self.rank[ru as usize].load(Ordering::Relaxed);
      let rank_v = self.rank[rv as usize].load(Ordering::Relaxed);
      if rank_u < rank_v {
        self.parent[ru as usize].store(rv, Ordering::Relaxed);
      } else if rank_v < rank_u {
        self.parent[rv as usize].store(ru, Ordering::Relaxed);
      } else {
        self.parent[rv as usize].store(ru, Ordering::Relaxed);
        self.rank[ru as usize].store(rank_u + 1, Ordering::Relaxed);
      }
      return;
    }
  }
}


/// Connected components over all edges.

pub fn parallel_components<T: Real>(csr: &CsrSnapshot<T>, workers: &Workers) -> Vec<Vec<String>> {
  parallel_components_where(csr, workers, |_, _| true )
}

/// Connected components over the edges accepted by `predicate`,
/// computed by a parallel union-find pass over every node's edge
/// slice, followed by a parallel grouping pass.
///
/// Components and their members come back sorted by id.

pub fn parallel_components_where<T, P>(
  csr: &CsrSnapshot<T>,
  workers: &Workers,
  predicate: P,
) -> Vec<Vec<String>>
where
  T: Real,
  P: Fn(u32, T) -> bool + Send + Sync,
{
  let len = csr.node_count();
  let set = DisjointSet::new(len);

  {
    let guard = csr.weights.data();
    let weights: &[T] = &guard;
    workers.install(|| {
      (0..len as u32).into_par_iter().for_each(|u| {
        for edge in csr.edge_range(u) {
          let v = csr.col_idx[edge];
          if predicate(v, weights[edge]) {
            set.union(u, v);
          }
        }
      });
    });
  }

  let groups: DashMap<u32, Vec<String>> = DashMap::new();
  workers.install(|| {
    (0..len as u32).into_par_iter().for_each(|i| {
      let root = set.find(i);
      groups.entry(root).or_default().push(csr.id_of(i).to_string());
    });
  });

  sorted_islands(groups.into_iter().map(|(_, ids)| ids ))
}

/// Sequential breadth-first reference: produces the same partition as
/// the parallel pass for any predicate.

pub fn bfs_components<T: Real>(csr: &CsrSnapshot<T>) -> Vec<Vec<String>> {
  bfs_components_where(csr, |_, _| true )
}

pub fn bfs_components_where<T, P>(csr: &CsrSnapshot<T>, predicate: P) -> Vec<Vec<String>>
where
  T: Real,
  P: Fn(u32, T) -> bool,
{
  let len = csr.node_count();
  let weights = csr.weights_vec();
  let mut visited = vec![false; len];
  let mut islands = vec![];

  for start in 0..len as u32 {
    if visited[start as usize] { continue }
    visited[start as usize] = true;
    let mut island = vec![];
    let mut queue = VecDeque::from([start]);

    while let Some(u) = queue.pop_front() {
      island.push(csr.id_of(u).to_string());
      for edge in csr.edge_range(u) {
        let v = csr.col_idx[edge];
        if predicate(v, weights[edge]) && !visited[v as usize] {
          visited[v as usize] = true;
          queue.push_back(v);
        }
      }
    }
    islands.push(island);
  }

  sorted_islands(islands)
}

fn sorted_islands(islands: impl IntoIterator<Item = Vec<String>>) -> Vec<Vec<String>> {
  islands.into_iter()
    .map(|mut ids| { ids.sort(); ids })
    .sorted()
    .collect()
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::graph::Graph;

  fn bridge() -> CsrSnapshot<f32> {
    // Two tight islands joined by one weak edge
    let graph = Graph::new();
    for id in ["a", "b", "c", "d"] {
      graph.get_or_add_node(id, ()).unwrap();
    }
    graph.accumulate_edge("a", "b", 1.0, 0).unwrap();
    graph.accumulate_edge("c", "d", 1.0, 0).unwrap();
    graph.accumulate_edge("b", "c", 0.05, 0).unwrap();
    graph.compile_csr()
  }

  #[test]
  fn one_component_without_predicate() {
    let csr = bridge();
    let workers = Workers::serial().unwrap();
    let islands = parallel_components(&csr, &workers);
    assert_eq!(islands, vec![vec!["a", "b", "c", "d"]]);
  }

  #[test]
  fn predicate_splits_weak_bridge() {
    let csr = bridge();
    let workers = Workers::serial().unwrap();
    let islands = parallel_components_where(&csr, &workers, |_, w| w > 0.1 );
    assert_eq!(islands, vec![vec!["a", "b"], vec!["c", "d"]]);
  }

  #[test]
  fn parallel_matches_bfs() {
    let graph = Graph::new();
    for i in 0..40 {
      graph.get_or_add_node(&format!("n{i:02}"), ()).unwrap();
    }
    // Chains of five with varying weights
    for i in 0..40 {
      if i % 5 != 4 {
        let weight = if i % 2 == 0 { 1.0 } else { 0.2 };
        graph.accumulate_edge(&format!("n{i:02}"), &format!("n{:02}", i + 1), weight, 0).unwrap();
      }
    }
    let csr = graph.compile_csr();
    let workers = Workers::with_threads(4).unwrap();

    assert_eq!(parallel_components(&csr, &workers), bfs_components(&csr));
    assert_eq!(
      parallel_components_where(&csr, &workers, |_, w| w > 0.5 ),
      bfs_components_where(&csr, |_, w| w > 0.5 ),
    );
  }

  #[test]
  fn isolated_nodes_are_singletons() {
    let graph: Graph<f64> = Graph::new();
    graph.get_or_add_node("x", ()).unwrap();
    graph.get_or_add_node("y", ()).unwrap();
    let csr = graph.compile_csr();
    let workers = Workers::serial().unwrap();
    assert_eq!(parallel_components(&csr, &workers), vec![vec!["x"], vec!["y"]]);
  }

  #[test]
  fn self_loop_stays_single() {
    let graph: Graph<f64> = Graph::new();
    graph.get_or_add_node("solo", ()).unwrap();
    graph.accumulate_edge("solo", "solo", 2.0, 0).unwrap();
    let csr = graph.compile_csr();
    let workers = Workers::serial().unwrap();
    assert_eq!(parallel_components(&csr, &workers), vec![vec!["solo"]]);
  }

  #[test]
  fn contended_union_converges() {
    // Everything unions into one line under real parallelism
    let graph: Graph<f32> = Graph::new();
    for i in 0..200 {
      graph.get_or_add_node(&format!("v{i:03}"), ()).unwrap();
    }
    for i in 0..199 {
      graph.accumulate_edge(&format!("v{i:03}"), &format!("v{:03}", i + 1), 1.0, 0).unwrap();
    }
    let csr = graph.compile_csr();
    let workers = Workers::hardware().unwrap();
    let islands = parallel_components(&csr, &workers);
    assert_eq!(islands.len(), 1);
    assert_eq!(islands[0].len(), 200);
  }
}

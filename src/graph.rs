use std::collections::BTreeMap;

use dashmap::DashMap;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::{
  internal::*,
  error::{ Error, Result },
  scalar::Real,
  workers::Workers,
};

mod csr;
mod cc;
mod io;

pub use csr::CsrSnapshot;
pub use cc::{ parallel_components, parallel_components_where, bfs_components, bfs_components_where };


/// A weighted, timestamped edge to some target node.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge<T: Real> {
  pub weight: T,
  pub last_modified: i64,
}

type EdgeMap<T> = BTreeMap<String, Edge<T>>;


/// A node in a [Graph]: a string identity, an opaque payload and the
/// monitor-protected map of outgoing edges.

#[derive(Debug)]
pub struct GraphNode<T: Real, D = ()> {
  id: String,
  pub data: D,
  edges: Mutex<EdgeMap<T>>,
}

impl<T: Real, D> GraphNode<T, D> {
  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn degree(&self) -> usize {
    self.edges.lock().len()
  }

  pub fn edge(&self, to: &str) -> Option<Edge<T>> {
    self.edges.lock().get(to).copied()
  }

  /// Neighbor ids in ascending order.

  pub fn neighbors(&self) -> Vec<String> {
    self.edges.lock().keys().cloned().collect()
  }
}


/// A concurrent, logically undirected multigraph keyed by string ids.
///
/// The id index is a concurrent map; each node's edge map is guarded
/// by its own monitor. Updates that touch two nodes take both
/// monitors in ascending id order, which rules out lock cycles.
///
/// Weights accumulate: repeated [accumulate_edge](Graph::accumulate_edge)
/// calls sum their deltas on both reciprocal edges and keep the
/// maximum timestamp seen.

#[derive(Debug, Default)]
pub struct Graph<T: Real, D = ()> {
  nodes: DashMap<String, RcT<GraphNode<T, D>>>,
}

impl<T: Real, D: Send + Sync> Graph<T, D> {
  pub fn new() -> Self {
    Self { nodes: DashMap::new() }
  }

  /// Atomic upsert: concurrent calls with the same id all observe the
  /// same node. The payload of an existing node is left untouched.

  pub fn get_or_add_node(&self, id: &str, data: D) -> Result<RcT<GraphNode<T, D>>> {
    if id.trim().is_empty() {
      return Err(Error::InvalidId(id.to_string()));
    }
    let node = self.nodes
      .entry(id.to_string())
      .or_insert_with(|| RcT::new(GraphNode {
        id: id.to_string(),
        data,
        edges: Mutex::new(EdgeMap::new()),
      }))
      .clone();
    Ok(node)
  }

  pub fn try_get_node(&self, id: &str) -> Option<RcT<GraphNode<T, D>>> {
    self.nodes.get(id).map(|entry| entry.value().clone() )
  }

  pub fn get_node(&self, id: &str) -> Result<RcT<GraphNode<T, D>>> {
    self.try_get_node(id).ok_or_else(|| Error::NodeMissing(id.to_string()) )
  }

  pub fn contains(&self, id: &str) -> bool {
    self.nodes.contains_key(id)
  }

  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  /// Add `delta` to the weight of `from → to` and `to → from`,
  /// creating the edges as needed. The timestamp is max-monotone.
  /// Both reciprocal updates happen under the pair of node monitors,
  /// taken in ascending id order; a self-loop touches a single edge
  /// under a single monitor.

  pub fn accumulate_edge(&self, from: &str, to: &str, delta: T, timestamp: i64) -> Result<()> {
    let lhs = self.get_node(from)?;
    let rhs = self.get_node(to)?;

    if from == to {
      let mut edges = lhs.edges.lock();
      Self::bump(&mut edges, to, delta, timestamp);
      return Ok(());
    }

    let (mut from_edges, mut to_edges);
    if from < to {
      from_edges = lhs.edges.lock();
      to_edges = rhs.edges.lock();
    } else {
      to_edges = rhs.edges.lock();
      from_edges = lhs.edges.lock();
    }
    Self::bump(&mut from_edges, to, delta, timestamp);
    Self::bump(&mut to_edges, from, delta, timestamp);
    Ok(())
  }

  fn bump(edges: &mut EdgeMap<T>, target: &str, delta: T, timestamp: i64) {
    let edge = edges
      .entry(target.to_string())
      .or_insert(Edge { weight: T::zero(), last_modified: timestamp });
    edge.weight += delta;
    edge.last_modified = edge.last_modified.max(timestamp);
  }

  /// Remove a node and all reciprocal edges pointing back at it.
  ///
  /// The node leaves the index first, so no new edges can reach it,
  /// then each neighbor is snipped under the pair lock. Returns false
  /// when the id was already absent.

  pub fn remove_node(&self, id: &str) -> bool {
    let Some((_, node)) = self.nodes.remove(id) else { return false };
    let neighbors: Vec<String> = node.neighbors();

    for neighbor_id in neighbors {
      if neighbor_id == id { continue }
      let Some(neighbor) = self.try_get_node(&neighbor_id) else { continue };

      let (mut own, mut theirs);
      if id < neighbor_id.as_str() {
        own = node.edges.lock();
        theirs = neighbor.edges.lock();
      } else {
        theirs = neighbor.edges.lock();
        own = node.edges.lock();
      }
      // The neighbor may have been removed by another thread meanwhile;
      // its own removal pass handles the reciprocal entry then.
      if self.nodes.contains_key(&neighbor_id) {
        theirs.remove(id);
      }
      own.remove(&neighbor_id);
    }
    true
  }

  /// Run `action` against every node on the worker pool.

  pub fn parallel_scan(&self, workers: &Workers, action: impl Fn(&GraphNode<T, D>) + Send + Sync) {
    let nodes = self.handles();
    workers.install(|| {
      nodes.par_iter().for_each(|node| action(node) );
    });
  }

  /// Map every node through `selector` on the worker pool.

  pub fn parallel_project<R: Send>(
    &self,
    workers: &Workers,
    selector: impl Fn(&GraphNode<T, D>) -> R + Send + Sync,
  ) -> Vec<R> {
    let nodes = self.handles();
    workers.install(|| {
      nodes.par_iter().map(|node| selector(node) ).collect()
    })
  }

  /// Decay every edge weight by its age:
  /// `w ← w · exp(-λ · age_days)` with
  /// `age_days = max(0, (now − last_modified) / 86 400)`.

  pub fn apply_decay(&self, lambda: T, now: i64, workers: &Workers) {
    let day = T::from(86_400).unwrap();
    self.parallel_scan(workers, |node| {
      let mut edges = node.edges.lock();
      for edge in edges.values_mut() {
        let age_days = T::from(now - edge.last_modified).unwrap() / day;
        edge.weight = decayed(edge.weight, lambda, age_days);
      }
    });
  }

  fn handles(&self) -> Vec<RcT<GraphNode<T, D>>> {
    self.nodes.iter().map(|entry| entry.value().clone() ).collect()
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::time::Instant;

  fn pair() -> Graph<f64> {
    let graph = Graph::new();
    graph.get_or_add_node("a", ()).unwrap();
    graph.get_or_add_node("b", ()).unwrap();
    graph
  }

  #[test]
  fn upsert_returns_same_node() {
    let graph: Graph<f32, u32> = Graph::new();
    let first = graph.get_or_add_node("x", 1).unwrap();
    let again = graph.get_or_add_node("x", 2).unwrap();
    assert!(RcT::ptr_eq(&first, &again));
    assert_eq!(again.data, 1);
    assert_eq!(graph.node_count(), 1);
  }

  #[test]
  fn invalid_ids() {
    let graph: Graph<f32> = Graph::new();
    assert!(matches!(graph.get_or_add_node("", ()), Err(Error::InvalidId(_))));
    assert!(matches!(graph.get_or_add_node("  ", ()), Err(Error::InvalidId(_))));
  }

  #[test]
  fn missing_nodes() {
    let graph = pair();
    assert!(matches!(graph.accumulate_edge("a", "zzz", 1.0, 0), Err(Error::NodeMissing(_))));
    assert!(matches!(graph.get_node("zzz"), Err(Error::NodeMissing(_))));
    assert!(graph.try_get_node("zzz").is_none());
  }

  #[test]
  fn accumulate_both_directions() {
    let graph = pair();
    graph.accumulate_edge("a", "b", 2.0, 10).unwrap();
    graph.accumulate_edge("b", "a", 3.0, 5).unwrap();

    let a = graph.get_node("a").unwrap();
    let b = graph.get_node("b").unwrap();
    assert_eq!(a.edge("b"), Some(Edge { weight: 5.0, last_modified: 10 }));
    assert_eq!(b.edge("a"), Some(Edge { weight: 5.0, last_modified: 10 }));
    assert_eq!(a.degree(), 1);
  }

  #[test]
  fn self_loop_single_edge() {
    let graph = pair();
    graph.accumulate_edge("a", "a", 4.0, 7).unwrap();
    let a = graph.get_node("a").unwrap();
    assert_eq!(a.degree(), 1);
    assert_eq!(a.edge("a"), Some(Edge { weight: 4.0, last_modified: 7 }));
  }

  #[test]
  fn remove_is_symmetric_and_idempotent() {
    let graph = pair();
    graph.get_or_add_node("c", ()).unwrap();
    graph.accumulate_edge("a", "b", 1.0, 0).unwrap();
    graph.accumulate_edge("b", "c", 1.0, 0).unwrap();

    assert!(graph.remove_node("b"));
    assert!(!graph.contains("b"));
    assert_eq!(graph.get_node("a").unwrap().degree(), 0);
    assert_eq!(graph.get_node("c").unwrap().degree(), 0);
    assert!(!graph.remove_node("b"));
  }

  #[test]
  fn concurrent_accumulation_is_exact() {
    let graph = Arc::new(pair());
    let handles: Vec<_> = (0..8).map(|_| {
      let graph = graph.clone();
      std::thread::spawn(move || {
        for _ in 0..125 {
          graph.accumulate_edge("a", "b", 1.0, 0).unwrap();
        }
      })
    }).collect();
    for handle in handles { handle.join().unwrap() }

    let a = graph.get_node("a").unwrap();
    let b = graph.get_node("b").unwrap();
    assert_eq!(a.edge("b").unwrap().weight, 1000.0);
    assert_eq!(b.edge("a").unwrap().weight, 1000.0);
    assert_eq!(a.degree(), 1);
    assert_eq!(b.degree(), 1);
  }

  #[test]
  fn opposed_lock_orders_make_progress() {
    let graph = Arc::new(pair());
    let start = Instant::now();

    let forward = {
      let graph = graph.clone();
      std::thread::spawn(move || {
        for _ in 0..10_000 {
          graph.accumulate_edge("a", "b", 1.0, 0).unwrap();
        }
      })
    };
    let backward = {
      let graph = graph.clone();
      std::thread::spawn(move || {
        for _ in 0..10_000 {
          graph.accumulate_edge("b", "a", 1.0, 0).unwrap();
        }
      })
    };
    forward.join().unwrap();
    backward.join().unwrap();

    assert!(start.elapsed().as_secs() < 5);
    assert_eq!(graph.get_node("a").unwrap().edge("b").unwrap().weight, 20_000.0);
    assert_eq!(graph.get_node("b").unwrap().edge("a").unwrap().weight, 20_000.0);
  }

  #[test]
  fn concurrent_upsert_converges() {
    let graph: Arc<Graph<f32, usize>> = Arc::new(Graph::new());
    let handles: Vec<_> = (0..8).map(|i| {
      let graph = graph.clone();
      std::thread::spawn(move || graph.get_or_add_node("n", i).unwrap().id().to_string() )
    }).collect();
    for handle in handles { assert_eq!(handle.join().unwrap(), "n") }
    assert_eq!(graph.node_count(), 1);
  }

  #[test]
  fn scan_and_project() {
    let graph = pair();
    graph.get_or_add_node("c", ()).unwrap();
    let workers = Workers::serial().unwrap();

    let mut ids = graph.parallel_project(&workers, |node| node.id().to_string() );
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let count = std::sync::atomic::AtomicUsize::new(0);
    graph.parallel_scan(&workers, |_| {
      count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    });
    assert_eq!(count.into_inner(), 3);
  }

  #[test]
  fn half_life_decay() {
    let graph = pair();
    let half_life_secs = (138.629 * 86_400.0) as i64;
    graph.accumulate_edge("a", "b", 10.0, 0).unwrap();

    let workers = Workers::serial().unwrap();
    graph.apply_decay(0.005, half_life_secs, &workers);
    let weight = graph.get_node("a").unwrap().edge("b").unwrap().weight;
    assert!((weight - 5.0).abs() < 0.1, "decayed to {weight}");
  }

  #[test]
  fn decay_of_fresh_edge_is_identity() {
    let graph = pair();
    graph.accumulate_edge("a", "b", 3.5, 1_000).unwrap();
    let workers = Workers::serial().unwrap();
    graph.apply_decay(0.005, 1_000, &workers);
    assert_eq!(graph.get_node("a").unwrap().edge("b").unwrap().weight, 3.5);
  }
}

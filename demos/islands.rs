use gradforge::{ parallel_components_where, Graph, Result, Workers };

// Build a small interaction graph, compile it to CSR, decay old
// edges and list the islands that remain above a weight threshold.

fn main() -> Result<()> {
  let graph: Graph<f32> = Graph::new();
  let day = 86_400;

  for id in ["ada", "bob", "cyd", "dan", "eve", "fox"] {
    graph.get_or_add_node(id, ())?;
  }
  graph.accumulate_edge("ada", "bob", 5.0, 10 * day)?;
  graph.accumulate_edge("bob", "cyd", 4.0, 12 * day)?;
  graph.accumulate_edge("dan", "eve", 6.0, 11 * day)?;
  graph.accumulate_edge("cyd", "dan", 0.2, day)?;

  let workers = Workers::hardware()?;
  let csr = graph.compile_csr();
  println!("{} nodes, {} edges", csr.node_count(), csr.edge_count());
  println!("topology {}", csr.topology_hex());

  csr.apply_decay(0.05, 30 * day, &workers);

  let islands = parallel_components_where(&csr, &workers, |_, w| w > 0.5 );
  for island in islands {
    println!("island: {}", island.join(", "));
  }

  // The weight buffer doubles as tensor storage
  let weights = csr.weights_as_tensor();
  println!("decayed weights: {weights}");
  Ok(())
}

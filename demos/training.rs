use gradforge::{ Result, Tensor };

// Fit y = x·w + b against a fixed target with plain gradient steps.

fn main() -> Result<()> {
  let x = Tensor::new(4, 2, vec![
    0.0, 0.0,
    0.0, 1.0,
    1.0, 0.0,
    1.0, 1.0,
  ])?;
  let target = Tensor::new(4, 1, vec![0.0, 1.0, 1.0, 2.0])?;

  let w = Tensor::<f32>::randn(2, 1);
  let b = Tensor::<f32>::zeros(1, 1);
  let rate = 0.1;

  for step in 0..200 {
    let prediction = x.matmul(&w)?.add(&b)?;

    // d/dp of Σ (p - t)² is 2 (p - t); seed the backward pass with it
    let mut seed = vec![];
    let mut loss = 0.0;
    for i in 0..4 {
      let diff = prediction.value(i, 0) - target.value(i, 0);
      loss += diff * diff;
      seed.push(2.0 * diff);
    }
    prediction.backward_seeded(&Tensor::new(4, 1, seed)?)?;

    for i in 0..2 {
      w.set(i, 0, w.value(i, 0) - rate * w.grad_value(i, 0));
    }
    b.set(0, 0, b.value(0, 0) - rate * b.grad_value(0, 0));
    prediction.reset();

    if step % 50 == 0 {
      println!("step {step:3}  loss {loss:.6}");
    }
  }

  println!("w = {w}");
  println!("b = {b}");
  Ok(())
}

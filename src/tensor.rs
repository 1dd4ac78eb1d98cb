use std::collections::HashSet;

use rand::Rng;

use crate::{
  internal::*,
  error::{ Error, Result },
  shape::Shape,
  storage::Storage,
  scalar::Real,
};

mod ops;

pub(crate) use ops::{ Op, matmul_into };


/// A two-dimensional tensor: a strided view over a [Storage] plus the
/// record of the operation that produced it.
///
/// Tensors created directly are leaves. Operations return new tensors
/// whose nodes reference their inputs, forming a DAG that
/// [backward](Tensor::backward) walks in reverse-topological order to
/// accumulate gradients.
///
/// Cloning a tensor, transposing it or viewing foreign storage never
/// copies the underlying buffers.

#[derive(Debug, Clone)]
pub struct Tensor<T: Real> {
  pub(crate) node: RcT<Node<T>>,
}

#[derive(Debug)]
pub(crate) struct Node<T: Real> {
  pub id: usize,
  pub shape: Shape,
  pub storage: Storage<T>,
  pub op: Option<Op>,
  pub inputs: Vec<Tensor<T>>,
}

impl<T: Real> PartialEq for Tensor<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.rows() == rhs.rows() && self.cols() == rhs.cols() && self.data() == rhs.data()
  }
}

impl<T: Real> Tensor<T> {
  pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
    if data.len() != rows * cols {
      return Err(Error::ShapeMismatch(format!(
        "{} values for a {}x{} tensor", data.len(), rows, cols,
      )));
    }
    Ok(Self::leaf(Shape::new(rows, cols), Storage::from_vec(data)))
  }

  pub fn zeros(rows: usize, cols: usize) -> Self {
    Self::fill(rows, cols, T::zero())
  }

  pub fn ones(rows: usize, cols: usize) -> Self {
    Self::fill(rows, cols, T::one())
  }

  pub fn fill(rows: usize, cols: usize, filler: T) -> Self {
    Self::leaf(Shape::new(rows, cols), Storage::from_vec(vec![filler; rows * cols]))
  }

  pub fn scalar(item: T) -> Self {
    Self::fill(1, 1, item)
  }

  pub fn rand(rows: usize, cols: usize) -> Self {
    let mut rng = rand::thread_rng();
    let data = (0..rows * cols).map(|_| rng.gen_range(T::zero()..T::one()) ).collect();
    Self::leaf(Shape::new(rows, cols), Storage::from_vec(data))
  }

  pub fn randn(rows: usize, cols: usize) -> Self {
    let len = rows * cols;
    let mut data = vec![T::zero(); len];
    for i in 0..len.div_ceil(2) {
      let (r1, r2) = randn();
      data[i * 2] = r1;
      if i * 2 + 1 < len { data[i * 2 + 1] = r2 }
    }
    Self::leaf(Shape::new(rows, cols), Storage::from_vec(data))
  }

  /// View constructor: wrap existing storage without copying.
  ///
  /// Fails when the shape addresses past the end of the buffer.

  pub fn from_storage(shape: Shape, storage: Storage<T>) -> Result<Self> {
    if shape.size() > 0 && shape.max_index() >= storage.len() {
      return Err(Error::ShapeMismatch(format!(
        "{} addresses {} elements but storage holds {}",
        shape, shape.max_index() + 1, storage.len(),
      )));
    }
    Ok(Self::leaf(shape, storage))
  }

  /// Infallible view used where the shape is derived from the
  /// storage itself (e.g. snapshot weight buffers).

  pub(crate) fn view(shape: Shape, storage: Storage<T>) -> Self {
    Self::leaf(shape, storage)
  }

  fn leaf(shape: Shape, storage: Storage<T>) -> Self {
    Self {
      node: RcT::new(Node { id: make_id(), shape, storage, op: None, inputs: vec![] }),
    }
  }

  fn operation(op: Op, shape: Shape, data: Vec<T>, inputs: Vec<Tensor<T>>) -> Self {
    Self {
      node: RcT::new(Node {
        id: make_id(),
        storage: Storage::from_vec(data),
        shape,
        op: Some(op),
        inputs,
      }),
    }
  }

  pub fn id(&self) -> usize {
    self.node.id
  }

  pub fn shape(&self) -> &Shape {
    &self.node.shape
  }

  pub fn rows(&self) -> usize {
    self.node.shape.rows
  }

  pub fn cols(&self) -> usize {
    self.node.shape.cols
  }

  pub fn size(&self) -> usize {
    self.node.shape.size()
  }

  pub(crate) fn storage(&self) -> &Storage<T> {
    &self.node.storage
  }

  pub fn value(&self, i: usize, j: usize) -> T {
    self.node.storage.data()[self.node.shape.index(i, j)]
  }

  pub fn set(&self, i: usize, j: usize, value: T) {
    self.node.storage.data_mut()[self.node.shape.index(i, j)] = value;
  }

  pub fn item(&self) -> T {
    assert!(self.size() == 1, "Can't extract item from non-scalar {}", self.node.shape);
    self.value(0, 0)
  }

  /// Snapshot of the logical contents in row-major order.

  pub fn data(&self) -> Vec<T> {
    let data = self.node.storage.data();
    self.node.shape.iter().map(|addr| data[addr] ).collect()
  }

  /// Snapshot of the logical gradient in row-major order.

  pub fn grad(&self) -> Vec<T> {
    let grad = self.node.storage.grad();
    self.node.shape.iter().map(|addr| grad[addr] ).collect()
  }

  pub fn grad_value(&self, i: usize, j: usize) -> T {
    self.node.storage.grad()[self.node.shape.index(i, j)]
  }

  pub fn shares_storage(&self, other: &Self) -> bool {
    self.node.storage.shares_with(&other.node.storage)
  }

  /// Zero-copy transpose: dimensions and strides swap, storage is
  /// shared, so mutations remain visible through both views.

  pub fn transpose(&self) -> Self {
    Self::leaf(self.node.shape.transpose(), self.node.storage.clone())
  }

  /// Matrix product `self(n,m) · rhs(m,p)`.

  pub fn matmul(&self, rhs: &Self) -> Result<Self> {
    if self.cols() != rhs.rows() {
      return Err(Error::ShapeMismatch(format!(
        "matmul inner dimensions disagree: {} vs {}", self.node.shape, rhs.node.shape,
      )));
    }
    let shape = Shape::new(self.rows(), rhs.cols());
    let mut data = vec![T::zero(); shape.size()];
    {
      let lhs_data = self.node.storage.data();
      let rhs_data = rhs.node.storage.data();
      matmul_into(&lhs_data, &self.node.shape, &rhs_data, &rhs.node.shape, &mut data, &shape);
    }
    Ok(Self::operation(Op::MatMul, shape, data, vec![self.clone(), rhs.clone()]))
  }

  /// Element-wise sum with broadcasting: a dimension of 1 expands to
  /// match the other operand.

  pub fn add(&self, rhs: &Self) -> Result<Self> {
    let (rows, cols) = self.node.shape.broadcast_dims(&rhs.node.shape)?;
    let lhs_view = self.node.shape.broadcast(rows, cols)?;
    let rhs_view = rhs.node.shape.broadcast(rows, cols)?;
    let shape = Shape::new(rows, cols);
    let data = {
      let lhs_data = self.node.storage.data();
      let rhs_data = rhs.node.storage.data();
      lhs_view.iter()
        .zip(rhs_view.iter())
        .map(|(a, b)| lhs_data[a] + rhs_data[b] )
        .collect()
    };
    Ok(Self::operation(
      Op::Add { lhs_view, rhs_view },
      shape,
      data,
      vec![self.clone(), rhs.clone()],
    ))
  }

  pub fn relu(&self) -> Self {
    self.unary(Op::Relu, |a| if a > T::zero() { a } else { T::zero() })
  }

  pub fn tanh(&self) -> Self {
    self.unary(Op::Tanh, |a| a.tanh() )
  }

  fn unary(&self, op: Op, cb: impl Fn(T) -> T) -> Self {
    let data = self.data().into_iter().map(cb).collect();
    Self::operation(op, Shape::new(self.rows(), self.cols()), data, vec![self.clone()])
  }

  /// In-place exponential decay `x ← x · exp(-λ · max(0, time))`.
  ///
  /// Not recorded in the autograd DAG. Vanishing multipliers clamp
  /// the value to exactly zero.

  pub fn apply_decay(&self, lambda: T, time: T) {
    let mut data = self.node.storage.data_mut();
    for addr in self.node.shape.iter() {
      data[addr] = decayed(data[addr], lambda, time);
    }
  }

  /// Backpropagate from this tensor, seeding its gradient with ones.

  pub fn backward(&self) {
    self.seed(|_| T::one() );
    self.run_backward();
  }

  /// Backpropagate with an explicit upstream gradient.

  pub fn backward_seeded(&self, seed: &Self) -> Result<()> {
    if seed.rows() != self.rows() || seed.cols() != self.cols() {
      return Err(Error::ShapeMismatch(format!(
        "seed {} for root {}", seed.node.shape, self.node.shape,
      )));
    }
    let values = seed.data();
    let mut values = values.into_iter();
    self.seed(|_| values.next().unwrap() );
    self.run_backward();
    Ok(())
  }

  fn seed(&self, mut filler: impl FnMut(usize) -> T) {
    let mut grad = self.node.storage.grad_mut();
    for (i, addr) in self.node.shape.iter().enumerate() {
      grad[addr] = filler(i);
    }
  }

  fn run_backward(&self) {
    for node in self.history().iter().rev() {
      if let Some(op) = &node.op {
        op.backward(node);
      }
    }
  }

  /// Zero this tensor's gradient buffer. The engine never clears
  /// gradients on its own; call this between training iterations.

  pub fn zero_grad(&self) {
    self.node.storage.zero_grad();
  }

  /// Zero gradients across this tensor's entire graph.

  pub fn reset(&self) {
    for node in self.history() {
      node.storage.zero_grad();
    }
  }

  fn history(&self) -> Vec<RcT<Node<T>>> {
    let mut history = vec![];
    Self::history_recurse(&self.node, &mut history, &mut HashSet::new());
    history
  }

  fn history_recurse(node: &RcT<Node<T>>, history: &mut Vec<RcT<Node<T>>>, visited: &mut HashSet<usize>) {
    if visited.contains(&node.id) { return }
    visited.insert(node.id);
    for input in &node.inputs {
      Self::history_recurse(&input.node, history, visited);
    }
    history.push(node.clone());
  }
}

impl<T: Real> std::fmt::Display for Tensor<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Tensor[{}, {}] [", self.rows(), self.cols())?;
    for i in 0..self.rows() {
      let row: Vec<T> = (0..self.cols()).map(|j| self.value(i, j) ).collect();
      write!(f, "{}{:?}", if i == 0 { "" } else { ", " }, row)?;
    }
    write!(f, "]")
  }
}

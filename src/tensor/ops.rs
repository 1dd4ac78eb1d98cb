use crate::{
  shape::Shape,
  scalar::{ Numeric, Real },
  tensor::Node,
};


/// Operation record attached to a computed [Tensor](crate::Tensor).
///
/// One variant per differentiable operation, carrying whatever
/// metadata the backward pass needs. Dispatching over the variant
/// replaces per-node boxed closures.

#[derive(Debug, Clone)]
pub(crate) enum Op {
  MatMul,
  Add { lhs_view: Shape, rhs_view: Shape },
  Relu,
  Tanh,
}

impl Op {
  /// Accumulate gradients into this node's inputs, given the
  /// gradient already present on the node itself.

  pub fn backward<T: Real>(&self, node: &Node<T>) {
    match self {
      Op::MatMul => backward_matmul(node),
      Op::Add { lhs_view, rhs_view } => backward_add(node, lhs_view, rhs_view),
      Op::Relu => backward_relu(node),
      Op::Tanh => backward_tanh(node),
    }
  }
}


/// Strided reference kernel: `out(i,j) += Σₖ lhs(i,k) · rhs(k,j)`.
///
/// Addressing goes through each shape's strides, so transposed and
/// broadcast views multiply without being copied first. Accumulating
/// into `out` lets the backward pass reuse the kernel directly on
/// gradient buffers.

pub(crate) fn matmul_into<T: Numeric>(
  lhs: &[T], lhs_shape: &Shape,
  rhs: &[T], rhs_shape: &Shape,
  out: &mut [T], out_shape: &Shape,
) {
  let n = lhs_shape.rows;
  let m = lhs_shape.cols;
  let p = rhs_shape.cols;
  for i in 0..n {
    for j in 0..p {
      let mut sum = T::zero();
      for k in 0..m {
        sum = sum + lhs[lhs_shape.index(i, k)] * rhs[rhs_shape.index(k, j)];
      }
      out[out_shape.index(i, j)] += sum;
    }
  }
}

// A(n,m) · B(m,p) = C(n,p)
// dA += dC · Bᵀ and dB += Aᵀ · dC, via the same strided kernel over
// gradient buffers viewed through the operand shapes.

fn backward_matmul<T: Real>(node: &Node<T>) {
  let a = &node.inputs[0];
  let b = &node.inputs[1];
  let grad_out = node.storage.grad();

  {
    let b_data = b.node.storage.data();
    let mut a_grad = a.node.storage.grad_mut();
    matmul_into(
      &grad_out, &node.shape,
      &b_data, &b.node.shape.transpose(),
      &mut a_grad, &a.node.shape,
    );
  }
  {
    let a_data = a.node.storage.data();
    let mut b_grad = b.node.storage.grad_mut();
    matmul_into(
      &a_data, &a.node.shape.transpose(),
      &grad_out, &node.shape,
      &mut b_grad, &b.node.shape,
    );
  }
}

// Each output cell read an operand cell through its broadcast view;
// zero strides along expanded dimensions make the accumulation
// sum-reduce those dimensions naturally.

fn backward_add<T: Real>(node: &Node<T>, lhs_view: &Shape, rhs_view: &Shape) {
  let grad_out = node.storage.grad();
  for (input, view) in node.inputs.iter().zip([lhs_view, rhs_view]) {
    let mut grad_in = input.node.storage.grad_mut();
    for i in 0..node.shape.rows {
      for j in 0..node.shape.cols {
        grad_in[view.index(i, j)] += grad_out[node.shape.index(i, j)];
      }
    }
  }
}

// Gradient flows where the forward output is strictly positive. Using
// the output instead of the input defines the gradient at zero as 0.

fn backward_relu<T: Real>(node: &Node<T>) {
  let input = &node.inputs[0];
  let out_data = node.storage.data();
  let grad_out = node.storage.grad();
  let mut grad_in = input.node.storage.grad_mut();
  for i in 0..node.shape.rows {
    for j in 0..node.shape.cols {
      let out = node.shape.index(i, j);
      if out_data[out] > T::zero() {
        grad_in[input.node.shape.index(i, j)] += grad_out[out];
      }
    }
  }
}

fn backward_tanh<T: Real>(node: &Node<T>) {
  let input = &node.inputs[0];
  let out_data = node.storage.data();
  let grad_out = node.storage.grad();
  let mut grad_in = input.node.storage.grad_mut();
  for i in 0..node.shape.rows {
    for j in 0..node.shape.cols {
      let out = node.shape.index(i, j);
      let t = out_data[out];
      grad_in[input.node.shape.index(i, j)] += grad_out[out] * (T::one() - t * t);
    }
  }
}

use parking_lot::{ RwLockReadGuard, RwLockWriteGuard };

use crate::{
  internal::*,
  scalar::Numeric,
};


/// A flat value buffer paired with a gradient buffer of identical
/// length. Cloning shares both buffers, which is the aliasing
/// primitive behind zero-copy transposes and snapshot weight views.

#[derive(Debug, Clone)]
pub struct Storage<T: Numeric> {
  data: RcCell<T>,
  grad: RcCell<T>,
}

impl<T: Numeric> Storage<T> {
  pub fn new(len: usize) -> Self {
    Self::from_vec(vec![T::zero(); len])
  }

  pub fn from_vec(data: Vec<T>) -> Self {
    let grad = vec![T::zero(); data.len()];
    Self { data: make_cell(data), grad: make_cell(grad) }
  }

  pub fn len(&self) -> usize {
    self.data.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn data(&self) -> RwLockReadGuard<Vec<T>> {
    self.data.read()
  }

  pub fn data_mut(&self) -> RwLockWriteGuard<Vec<T>> {
    self.data.write()
  }

  pub fn grad(&self) -> RwLockReadGuard<Vec<T>> {
    self.grad.read()
  }

  pub fn grad_mut(&self) -> RwLockWriteGuard<Vec<T>> {
    self.grad.write()
  }

  pub fn shares_with(&self, other: &Self) -> bool {
    RcT::ptr_eq(&self.data, &other.data)
  }

  pub fn zero_grad(&self) {
    self.grad.write().fill(T::zero());
  }

  pub fn fill_grad(&self, filler: T) {
    self.grad.write().fill(filler);
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parallel_buffers() {
    let storage = Storage::from_vec(vec![1.0, 2.0, 3.0]);
    assert_eq!(storage.len(), 3);
    assert_eq!(*storage.grad(), vec![0.0, 0.0, 0.0]);
  }

  #[test]
  fn sharing() {
    let storage = Storage::from_vec(vec![1.0, 2.0]);
    let view = storage.clone();
    view.data_mut()[0] = 7.0;
    assert_eq!(storage.data()[0], 7.0);
    assert!(storage.shares_with(&view));
    assert!(!storage.shares_with(&Storage::from_vec(vec![1.0, 2.0])));
  }

  #[test]
  fn grad_reset() {
    let storage = Storage::from_vec(vec![1.0, 2.0]);
    storage.fill_grad(1.0);
    assert_eq!(*storage.grad(), vec![1.0, 1.0]);
    storage.zero_grad();
    assert_eq!(*storage.grad(), vec![0.0, 0.0]);
  }
}

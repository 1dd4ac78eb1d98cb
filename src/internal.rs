use std::sync::Arc;
use std::sync::atomic::{ AtomicUsize, Ordering };

use parking_lot::RwLock;
use rand::Rng;

use crate::scalar::Real;


pub type RcT<T> = Arc<T>;

pub type RcCell<T> = Arc<RwLock<Vec<T>>>;

pub fn make_cell<T>(data: Vec<T>) -> RcCell<T> {
  Arc::new(RwLock::new(data))
}


static LAST_ID: AtomicUsize = AtomicUsize::new(0);

pub fn make_id() -> usize {
  LAST_ID.fetch_add(1, Ordering::Relaxed)
}


/// Decay multipliers below this threshold clamp the decayed value to zero.

pub const DECAY_EPSILON: f64 = 1e-7;

pub fn decay_scale<T: Real>(lambda: T, delta: T) -> T {
  let delta = if delta < T::zero() { T::zero() } else { delta };
  (-lambda * delta).exp()
}

pub fn decayed<T: Real>(value: T, lambda: T, delta: T) -> T {
  let scale = decay_scale(lambda, delta);
  if scale < T::from(DECAY_EPSILON).unwrap() {
    T::zero()
  } else {
    value * scale
  }
}


// Polar Box-Muller transformation

pub fn randn<T: Real>() -> (T, T) {
  let mut rng = rand::thread_rng();
  let u = rng.gen_range(-T::one()..T::one());
  let v = rng.gen_range(-T::one()..T::one());
  let r = u * u + v * v;
  // Try again if outside interval
  if r == T::zero() || r >= T::one() { return randn() }
  let c = (T::from(-2.0).unwrap() * r.ln() / r).sqrt();
  (u * c, v * c)
}

use crate::{
  error::{ Error, Result },
  scalar::Real,
};


/// Dot product of two equal-length vectors.

pub fn dot<T: Real>(lhs: &[T], rhs: &[T]) -> Result<T> {
  if lhs.len() != rhs.len() {
    return Err(Error::DimensionMismatch { lhs: lhs.len(), rhs: rhs.len() });
  }
  Ok(lhs.iter().zip(rhs).fold(T::zero(), |acc, (&a, &b)| acc + a * b ))
}

/// Euclidean magnitude.

pub fn l2_norm<T: Real>(vec: &[T]) -> T {
  vec.iter().fold(T::zero(), |acc, &a| acc + a * a ).sqrt()
}

/// Cosine similarity; zero-magnitude inputs yield 0 instead of
/// dividing by zero.

pub fn cosine<T: Real>(lhs: &[T], rhs: &[T]) -> Result<T> {
  let product = dot(lhs, rhs)?;
  let magnitude = l2_norm(lhs) * l2_norm(rhs);
  if magnitude == T::zero() {
    Ok(T::zero())
  } else {
    Ok(product / magnitude)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dot_product() {
    assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap(), 32.0);
    assert!(dot(&[1.0], &[1.0, 2.0]).is_err());
  }

  #[test]
  fn norm() {
    assert_eq!(l2_norm(&[3.0, 4.0]), 5.0);
  }

  #[test]
  fn cosine_similarity() {
    let same: f64 = cosine(&[1.0, 2.0], &[2.0, 4.0]).unwrap();
    assert!((same - 1.0).abs() < 1e-12);
    let orthogonal: f64 = cosine(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
    assert_eq!(orthogonal, 0.0);
  }

  #[test]
  fn cosine_degenerate() {
    assert_eq!(cosine(&[0.0, 0.0], &[1.0, 2.0]).unwrap(), 0.0);
  }
}

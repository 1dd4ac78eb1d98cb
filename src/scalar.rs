use rand::distributions::uniform::SampleUniform;
use num_traits::{ NumAssignOps, Num, NumCast };


/// All types that may be stored in a [Storage](crate::Storage) buffer.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Inner: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug {}
impl<T: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug> Inner for T {}


/// All numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Numeric: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum {}
impl<T: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum> Numeric for T {}


/// All continuous numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Real: Numeric + num_traits::real::Real + SampleUniform {}
impl<T: Numeric + num_traits::real::Real + SampleUniform> Real for T {}

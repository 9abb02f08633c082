//! **stopgrid-core**: geometry shared by the *stopgrid* crates.
//!
//! Integer grid addressing ([`Point`], [`Range`]) and the continuous
//! world-space position ([`Vec3`]) that agents move through.

pub mod geom;

pub use geom::{Point, Range, RangeIter, Vec3};

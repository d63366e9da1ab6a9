//! Binary representation of the parts of a class file that stack map tables touch
//!
//! Everything here is already resolved: classes are referred to by constant pool indices and
//! frames by their final offset deltas.

mod attribute;
mod binary_format;
mod constants;

pub use attribute::*;
pub use binary_format::*;
pub use constants::*;

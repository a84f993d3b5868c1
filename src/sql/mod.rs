//! Safe SQL builder: identifiers from validated settings only, values as parameters.

mod builder;
mod filter;
pub use builder::*;
pub use filter::*;

pub mod catalog;
pub mod code_allocator;
pub mod pricing;

pub use catalog::*;
pub use code_allocator::*;
pub use pricing::*;

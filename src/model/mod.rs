pub mod catalog;
pub mod common;
pub mod pricing;
pub mod user_context;

pub use catalog::*;
pub use common::*;
pub use pricing::*;
pub use user_context::*;

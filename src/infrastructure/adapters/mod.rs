//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod image;
pub mod inference;
pub mod speech;

pub use image::*;
pub use inference::*;
pub use speech::*;

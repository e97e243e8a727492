//! Memory Layer - In-Memory State Management
//!
//! 生成状态记录的内存实现

mod model_usage_store;

pub use model_usage_store::InMemoryModelUsageStore;

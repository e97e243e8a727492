//! Query Handlers 实现

mod profile_handlers;
mod status_handlers;

pub use profile_handlers::*;
pub use status_handlers::*;

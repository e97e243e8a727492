//! HTTP Handlers

mod chat;
mod ping;
mod profile;
mod scenario;
mod stage;
mod status;
mod surprise;

pub use chat::*;
pub use ping::*;
pub use profile::*;
pub use scenario::*;
pub use status::*;
pub use surprise::*;

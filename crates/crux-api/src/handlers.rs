//! Request handlers.

pub mod health;
pub mod tags;
pub mod videos;

pub use health::*;
pub use tags::*;
pub use videos::*;

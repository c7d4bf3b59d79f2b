//! Token models, the refresh seam, and the coordinator that owns the in-memory token cache.

pub mod coordinator;
pub mod refresher;
pub mod token;

pub use coordinator::*;
pub use refresher::*;
pub use token::{secret::*, *};

//! rusty-feed/crates/rf-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Rusty-Feed.

pub mod annotate;
pub mod error;
pub mod guard;
pub mod interaction;
pub mod models;
pub mod service;
pub mod traits;
pub mod validation;

// Re-exporting for easier access in other crates
pub use annotate::Annotator;
pub use error::*;
pub use interaction::{Action, InteractionController, VoteState};
pub use models::*;
pub use service::PostService;
pub use traits::*;

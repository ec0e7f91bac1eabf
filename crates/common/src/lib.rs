//! Shared types for the scenecraft workspace.
//!
//! Every crate speaks in terms of the same [`Transform`] and the same
//! resource [`Category`] set.

mod types;

pub use types::{Category, Transform};

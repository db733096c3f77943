//! Application services layer.
//!
//! Presentation state that the HTTP handlers mutate before notifying the
//! audience through the broadcast service.

pub mod presentation_store;

pub use presentation_store::{likert_percentage, LikertValue, OrderedTable, PresentationStore};

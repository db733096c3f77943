//! Event system for real-time client communication.
//!
//! This module provides:
//! - [`Event`], the immutable named payload fanned out to every subscriber
//! - [`Notifier`], the producer-facing helper the HTTP handlers publish through

mod notifier;

pub use notifier::Notifier;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tagged payload broadcast to all current subscribers.
///
/// The optional name selects the client-side channel (`event:` line of the
/// SSE frame); unnamed events go to the default `message` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    payload: Value,
}

impl Event {
    /// Creates an event routed to the given client-side channel.
    pub fn named(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: Some(name.into()),
            payload,
        }
    }

    /// Creates an event for the default channel.
    pub fn unnamed(payload: Value) -> Self {
        Self {
            name: None,
            payload,
        }
    }

    /// Returns the event name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the event payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

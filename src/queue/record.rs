//! On-disk record format.
//!
//! Each queued message is one JSON document named `<id>.json`. The id
//! starts with the creation time in unix milliseconds, so ascending file
//! name order is creation order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Extension of every record file.
pub const RECORD_EXTENSION: &str = "json";

/// A message as persisted by `enqueue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique, time-sortable identifier.
    pub id: String,
    /// Originating address. Not validated.
    pub number: String,
    /// Message body.
    pub text: String,
    /// Enqueue time in unix seconds. Informational only.
    pub received_at: f64,
}

impl MessageRecord {
    /// Build a record stamped with a fresh id and the current time.
    pub fn new(number: impl Into<String>, text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_message_id(now),
            number: number.into(),
            text: text.into(),
            received_at: unix_seconds(now),
        }
    }

    /// File name this record is stored under in every state directory.
    pub fn file_name(&self) -> String {
        record_file_name(&self.id)
    }
}

/// Generate a record id: zero-padded unix millis, a dash, then a
/// simple-format v4 UUID.
pub fn new_message_id(now: DateTime<Utc>) -> String {
    format!("{:013}-{}", now.timestamp_millis(), Uuid::new_v4().simple())
}

/// `<id>.json`.
pub fn record_file_name(id: &str) -> String {
    format!("{id}.{RECORD_EXTENSION}")
}

#[allow(clippy::cast_precision_loss)]
fn unix_seconds(now: DateTime<Utc>) -> f64 {
    now.timestamp_micros() as f64 / 1_000_000.0
}

// ---------------------------------------------------------------------------
// Delivery payload
// ---------------------------------------------------------------------------

/// The fields the worker needs to deliver a claimed record.
///
/// Both fields must be present and be strings. Unknown fields are ignored,
/// so a full [`MessageRecord`] parses as a payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeliveryPayload {
    /// Originating address.
    pub number: String,
    /// Message body.
    pub text: String,
}

/// Why a claimed record cannot be delivered. Never retried.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The bytes are not a JSON document.
    #[error("record is not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),
    /// JSON parsed but `number`/`text` are missing or not strings.
    #[error("record has an invalid shape: {0}")]
    Shape(#[source] serde_json::Error),
}

impl DeliveryPayload {
    /// Parse raw record bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] when the bytes are not JSON or lack a
    /// string `number` and `text`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(bytes).map_err(|e| {
            if e.is_data() {
                PayloadError::Shape(e)
            } else {
                PayloadError::Syntax(e)
            }
        })
    }
}

//! Event envelopes as received from the access node.

use crate::cadence::decode::{decode_payload, fields_from_map, DecodeError};
use crate::cadence::value::Value;
use std::collections::BTreeMap;

/// Body of a raw event: either the base64 JSON-Cadence payload or a field
/// map some upstream already decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    Payload(String),
    Fields(serde_json::Map<String, serde_json::Value>),
}

impl EventData {
    pub fn decode(&self) -> Result<BTreeMap<String, Value>, DecodeError> {
        match self {
            EventData::Payload(payload) => decode_payload(payload.trim().as_bytes()),
            EventData::Fields(map) => Ok(fields_from_map(map)),
        }
    }
}

/// An event exactly as the network reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub event_type: String,
    pub transaction_id: String,
    pub block_height: Option<u64>,
    pub transaction_index: u64,
    pub event_index: u64,
    pub data: EventData,
}

/// A raw event together with its decoded fields.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    pub raw: RawEvent,
    pub fields: BTreeMap<String, Value>,
}

impl DecodedEvent {
    pub fn decode(raw: RawEvent) -> Result<Self, DecodeError> {
        let fields = raw.data.decode()?;
        Ok(Self { raw, fields })
    }

    pub fn event_type(&self) -> &str {
        &self.raw.event_type
    }

    pub fn transaction_id(&self) -> &str {
        &self.raw.transaction_id
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Field map as plain JSON, for logs and the audit trail.
    pub fn fields_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

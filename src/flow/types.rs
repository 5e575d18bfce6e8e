//! Flow Access REST wire types (subset of fields we need).
//!
//! The access node serialises every 64-bit number as a JSON string, so the
//! numeric fields go through [`de_u64`].

use crate::cadence::{EventData, RawEvent};
use serde::{Deserialize, Deserializer};

pub(crate) fn de_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// `GET /v1/blocks?height=sealed` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeader {
    #[serde(default)]
    pub id: String,
    #[serde(deserialize_with = "de_u64")]
    pub height: u64,
}

/// `GET /v1/events` groups events per block.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockEvents {
    #[serde(default)]
    pub block_id: String,
    #[serde(deserialize_with = "de_u64")]
    pub block_height: u64,
    #[serde(default)]
    pub events: Vec<WireEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub transaction_id: String,
    #[serde(default, deserialize_with = "de_u64")]
    pub transaction_index: u64,
    #[serde(default, deserialize_with = "de_u64")]
    pub event_index: u64,
    #[serde(default)]
    pub payload: String,
}

impl WireEvent {
    pub fn into_raw(self, block_height: Option<u64>) -> RawEvent {
        RawEvent {
            event_type: self.event_type,
            transaction_id: self.transaction_id,
            block_height,
            transaction_index: self.transaction_index,
            event_index: self.event_index,
            data: EventData::Payload(self.payload),
        }
    }
}

/// `GET /v1/transaction_results/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub events: Vec<WireEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block_events() {
        let body = r#"[{
            "block_id": "7a2c",
            "block_height": "85113264",
            "block_timestamp": "2024-06-01T12:00:00Z",
            "events": [{
                "type": "A.4eb8a10cb9f87357.NFTStorefrontV2.ListingCompleted",
                "transaction_id": "c0ffee",
                "transaction_index": "3",
                "event_index": "11",
                "payload": "eyJ0eXBlIjoiRXZlbnQifQ=="
            }]
        }]"#;

        let blocks: Vec<BlockEvents> = serde_json::from_str(body).unwrap();
        assert_eq!(blocks[0].block_height, 85_113_264);

        let raw = blocks[0].events[0].clone().into_raw(Some(blocks[0].block_height));
        assert_eq!(raw.transaction_index, 3);
        assert_eq!(raw.event_index, 11);
        assert_eq!(raw.block_height, Some(85_113_264));
        assert_eq!(raw.data, EventData::Payload("eyJ0eXBlIjoiRXZlbnQifQ==".to_string()));
    }

    #[test]
    fn test_parse_transaction_result_without_events() {
        let body = r#"{ "block_id": "ab", "status": "Sealed", "status_code": 0 }"#;
        let result: TransactionResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.status, "Sealed");
        assert!(result.events.is_empty());
    }

    #[test]
    fn test_parse_sealed_block() {
        let body = r#"[{ "header": { "id": "f00d", "height": "85113270", "timestamp": "2024-06-01T12:00:04Z" } }]"#;
        let blocks: Vec<Block> = serde_json::from_str(body).unwrap();
        assert_eq!(blocks[0].header.height, 85_113_270);
    }
}

//! On-chain pin and edition lookup.
//!
//! The lookups are read-only Cadence scripts supplied by the operator (the
//! collection's own contracts define what they can return). Results come
//! back as JSON-Cadence and go through the same value decoder as events.

use crate::cadence::{Address, Value};
use crate::flow::{FetchError, FlowClient};
use crate::retry::{Attempt, RetryError, RetryPolicy};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("failed to read script {path}: {source}")]
    Script {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("script execution failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("script still failing after {attempts} attempts: {reason}")]
    Exhausted { attempts: u32, reason: String },
    #[error("unexpected script result: {0}")]
    Shape(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trait {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PinRecord {
    pub edition_id: String,
    pub serial_number: Option<String>,
    pub traits: Vec<Trait>,
}

impl PinRecord {
    pub fn trait_values(&self, name: &str) -> Option<&[String]> {
        self.traits
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.values.as_slice())
            .filter(|values| !values.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditionRecord {
    pub render_id: Option<String>,
    pub max_mint_size: Option<String>,
}

impl EditionRecord {
    /// Placeholder when the edition cannot be looked up.
    pub fn unknown() -> Self {
        Self {
            render_id: None,
            max_mint_size: None,
        }
    }

    /// Primary and secondary render image for this edition.
    pub fn image_urls(&self, image_base_url: &str) -> Option<(String, String)> {
        let render = self.render_id.as_deref()?;
        let base = image_base_url.trim_end_matches('/');
        Some((
            format!("{base}/render/{render}/front.png"),
            format!("{base}/render/{render}/front_cropped.png"),
        ))
    }
}

#[async_trait]
pub trait EditionLookup: Send + Sync {
    /// The token as held in `owner`'s collection, `None` if not found there.
    async fn pin(&self, owner: &Address, token_id: &str)
        -> Result<Option<PinRecord>, MetadataError>;

    async fn edition(&self, edition_id: &str) -> Result<Option<EditionRecord>, MetadataError>;
}

/// Used when no lookup scripts are configured.
pub struct DisabledMetadata;

#[async_trait]
impl EditionLookup for DisabledMetadata {
    async fn pin(&self, _owner: &Address, _token_id: &str) -> Result<Option<PinRecord>, MetadataError> {
        Ok(None)
    }

    async fn edition(&self, _edition_id: &str) -> Result<Option<EditionRecord>, MetadataError> {
        Ok(None)
    }
}

pub struct ScriptMetadata {
    client: FlowClient,
    pin_script: String,
    edition_script: String,
    policy: RetryPolicy,
}

impl ScriptMetadata {
    pub fn new(client: FlowClient, pin_script: String, edition_script: String, policy: RetryPolicy) -> Self {
        Self {
            client,
            pin_script,
            edition_script,
            policy,
        }
    }

    /// Read both scripts from disk.
    pub fn load(
        client: FlowClient,
        pin_path: &Path,
        edition_path: &Path,
        policy: RetryPolicy,
    ) -> Result<Self, MetadataError> {
        let read = |path: &Path| {
            std::fs::read_to_string(path).map_err(|source| MetadataError::Script {
                path: path.display().to_string(),
                source,
            })
        };
        Ok(Self::new(client, read(pin_path)?, read(edition_path)?, policy))
    }

    async fn run(&self, what: &str, script: &str, args: &[serde_json::Value]) -> Result<Value, MetadataError> {
        let result = self
            .policy
            .run(what, |_| async move {
                match self.client.execute_script(script, args).await {
                    Ok(value) => Attempt::Done(value),
                    Err(e) if e.is_transient() => Attempt::Retry(e.to_string()),
                    Err(e) => Attempt::Fail(e),
                }
            })
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(RetryError::Failed(e)) => Err(MetadataError::Fetch(e)),
            Err(RetryError::Exhausted {
                attempts,
                last_reason,
            }) => Err(MetadataError::Exhausted {
                attempts,
                reason: last_reason,
            }),
        }
    }
}

#[async_trait]
impl EditionLookup for ScriptMetadata {
    async fn pin(&self, owner: &Address, token_id: &str) -> Result<Option<PinRecord>, MetadataError> {
        let args = [
            json!({ "type": "Address", "value": owner.as_str() }),
            json!({ "type": "UInt64", "value": token_id }),
        ];
        let value = self.run("pin script", &self.pin_script, &args).await?;
        debug!(owner = %owner, token_id = token_id, "pin script returned");
        parse_pin(&value)
    }

    async fn edition(&self, edition_id: &str) -> Result<Option<EditionRecord>, MetadataError> {
        let args = [json!({ "type": "Int", "value": edition_id })];
        let value = self.run("edition script", &self.edition_script, &args).await?;
        debug!(edition_id = edition_id, "edition script returned");
        Ok(parse_edition(&value))
    }
}

fn present(value: &Value) -> Option<&Value> {
    match value {
        Value::Optional(None) | Value::Void => None,
        Value::Optional(Some(inner)) => present(inner),
        other => Some(other),
    }
}

/// Flatten a trait value to display strings.
fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().flat_map(strings).collect(),
        Value::Optional(Some(inner)) => strings(inner),
        Value::Fixed(d) => vec![d.normalize().to_string()],
        Value::Bool(b) => vec![b.to_string()],
        other => other.id_string().into_iter().collect(),
    }
}

fn parse_pin(value: &Value) -> Result<Option<PinRecord>, MetadataError> {
    let Some(pin) = present(value) else {
        return Ok(None);
    };
    let edition_id = pin
        .field("editionID")
        .and_then(Value::id_string)
        .ok_or_else(|| MetadataError::Shape("pin without editionID".to_string()))?;

    let traits = match pin.field("traits").and_then(present) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let name = item.field("name")?.as_str()?.to_string();
                let values = item.field("value").map(strings).unwrap_or_default();
                Some(Trait { name, values })
            })
            .collect(),
        Some(Value::Dictionary(entries)) => entries
            .iter()
            .filter_map(|(k, v)| {
                Some(Trait {
                    name: k.as_str()?.to_string(),
                    values: strings(v),
                })
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(Some(PinRecord {
        edition_id,
        serial_number: pin
            .field("serialNumber")
            .and_then(present)
            .and_then(Value::id_string),
        traits,
    }))
}

fn parse_edition(value: &Value) -> Option<EditionRecord> {
    let edition = present(value)?;
    Some(EditionRecord {
        render_id: edition
            .field("renderID")
            .and_then(present)
            .and_then(Value::id_string),
        max_mint_size: edition
            .field("maxMintSize")
            .and_then(present)
            .and_then(Value::id_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadence::decode_value;

    fn decode(doc: serde_json::Value) -> Value {
        decode_value(&doc).unwrap()
    }

    fn trait_struct(name: &str, value: serde_json::Value) -> serde_json::Value {
        json!({
            "type": "Struct",
            "value": {
                "id": "A.1d7e57aa55817448.MetadataViews.Trait",
                "fields": [
                    { "name": "name", "value": { "type": "String", "value": name } },
                    { "name": "value", "value": value }
                ]
            }
        })
    }

    #[test]
    fn test_parse_pin_result() {
        let doc = json!({
            "type": "Optional",
            "value": {
                "type": "Struct",
                "value": {
                    "id": "s.pin.PinData",
                    "fields": [
                        { "name": "editionID", "value": { "type": "Int", "value": "1187" } },
                        { "name": "serialNumber", "value": { "type": "Optional", "value": { "type": "UInt64", "value": "12" } } },
                        { "name": "traits", "value": { "type": "Array", "value": [
                            trait_struct("SetName", json!({ "type": "String", "value": "Villains" })),
                            trait_struct("Characters", json!({ "type": "Array", "value": [
                                { "type": "String", "value": "Maleficent" },
                                { "type": "String", "value": "Diablo" }
                            ] }))
                        ] } }
                    ]
                }
            }
        });

        let pin = parse_pin(&decode(doc)).unwrap().unwrap();

        assert_eq!(pin.edition_id, "1187");
        assert_eq!(pin.serial_number.as_deref(), Some("12"));
        assert_eq!(pin.trait_values("SetName"), Some(&["Villains".to_string()][..]));
        assert_eq!(
            pin.trait_values("Characters").map(|v| v.join(", ")),
            Some("Maleficent, Diablo".to_string())
        );
        assert_eq!(pin.trait_values("Rarity"), None);
    }

    #[test]
    fn test_nil_results_are_none() {
        let nil = decode(json!({ "type": "Optional", "value": null }));
        assert_eq!(parse_pin(&nil).unwrap(), None);
        assert_eq!(parse_edition(&nil), None);
    }

    #[test]
    fn test_pin_without_edition_is_shape_error() {
        let doc = json!({
            "type": "Struct",
            "value": { "id": "s.pin.PinData", "fields": [] }
        });
        assert!(matches!(parse_pin(&decode(doc)), Err(MetadataError::Shape(_))));
    }

    #[test]
    fn test_parse_edition_and_image_urls() {
        let doc = json!({
            "type": "Struct",
            "value": {
                "id": "A.edf9df96c92f4595.Pinnacle.Edition",
                "fields": [
                    { "name": "renderID", "value": { "type": "String", "value": "abc123" } },
                    { "name": "maxMintSize", "value": { "type": "Optional", "value": { "type": "UInt64", "value": "2500" } } }
                ]
            }
        });

        let edition = parse_edition(&decode(doc)).unwrap();

        assert_eq!(edition.max_mint_size.as_deref(), Some("2500"));
        let (front, cropped) = edition
            .image_urls("https://assets.disneypinnacle.com/")
            .unwrap();
        assert_eq!(front, "https://assets.disneypinnacle.com/render/abc123/front.png");
        assert_eq!(
            cropped,
            "https://assets.disneypinnacle.com/render/abc123/front_cropped.png"
        );
    }

    #[tokio::test]
    async fn test_disabled_lookup_returns_nothing() {
        let lookup = DisabledMetadata;
        let owner = Address::new("0xbbbbbbbbbbbbbbbb");
        assert_eq!(lookup.pin(&owner, "1").await.unwrap(), None);
        assert_eq!(lookup.edition("1").await.unwrap(), None);
    }
}

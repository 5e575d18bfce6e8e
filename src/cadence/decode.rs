//! Base64 JSON-Cadence payload decoding.
//!
//! A Flow event payload is base64 text wrapping a JSON-Cadence composite:
//!
//! ```text
//! { "type": "Event",
//!   "value": { "id": "A.4eb8a10cb9f87357.NFTStorefrontV2.ListingCompleted",
//!              "fields": [ { "name": "purchased", "value": { "type": "Bool", "value": true } }, ... ] } }
//! ```
//!
//! Decoding is all-or-nothing: any structural problem yields a
//! [`DecodeError`], never a partially filled field map.

use crate::cadence::value::Value;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rust_decimal::Decimal;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

const COMPOSITE_KINDS: &[&str] = &["Event", "Struct", "Resource", "Contract", "Enum"];

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed Cadence value: {0}")]
    Shape(String),
}

fn shape(msg: impl Into<String>) -> DecodeError {
    DecodeError::Shape(msg.into())
}

/// Decode a base64 event payload into its field map.
pub fn decode_payload(payload: &[u8]) -> Result<BTreeMap<String, Value>, DecodeError> {
    let root = decode_document(payload)?;
    decode_composite_fields(&root)
}

/// Base64 → UTF-8 → JSON, without interpreting the document.
pub fn decode_document(payload: &[u8]) -> Result<Json, DecodeError> {
    let bytes = BASE64.decode(payload)?;
    let text = String::from_utf8(bytes)?;
    Ok(serde_json::from_str(&text)?)
}

/// Field map of a root composite node.
pub fn decode_composite_fields(root: &Json) -> Result<BTreeMap<String, Value>, DecodeError> {
    let kind = tag(root)?;
    if !COMPOSITE_KINDS.contains(&kind) {
        return Err(shape(format!("root is {kind}, expected a composite")));
    }
    let body = root
        .get("value")
        .ok_or_else(|| shape("composite without value"))?;
    decode_fields(body)
}

fn tag(node: &Json) -> Result<&str, DecodeError> {
    node.get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| shape("value node without type tag"))
}

/// Decode the `fields` list of a composite body.
///
/// A field whose value is an `Optional` is stored one level unwrapped; an
/// empty optional stays as `Optional(None)` so absence is still visible.
fn decode_fields(body: &Json) -> Result<BTreeMap<String, Value>, DecodeError> {
    let fields = body
        .get("fields")
        .and_then(Json::as_array)
        .ok_or_else(|| shape("composite without fields list"))?;

    let mut out = BTreeMap::new();
    for field in fields {
        let name = field
            .get("name")
            .and_then(Json::as_str)
            .ok_or_else(|| shape("field without name"))?;
        let node = field
            .get("value")
            .ok_or_else(|| shape(format!("field {name} without value")))?;

        let value = match decode_value(node)? {
            Value::Optional(Some(inner)) => *inner,
            other => other,
        };
        out.insert(name.to_string(), value);
    }
    Ok(out)
}

/// Decode a single JSON-Cadence node, directed by its type tag.
pub fn decode_value(node: &Json) -> Result<Value, DecodeError> {
    let kind = tag(node)?;
    let body = node.get("value");

    match kind {
        k if is_integer_tag(k) => integer(body, k).map(Value::Integer),
        "UFix64" | "Fix64" => {
            let text = body
                .and_then(Json::as_str)
                .ok_or_else(|| shape(format!("{kind} without string value")))?;
            Decimal::from_str(text)
                .map(Value::Fixed)
                .map_err(|e| shape(format!("{kind} {text:?}: {e}")))
        }
        "Bool" => body
            .and_then(Json::as_bool)
            .map(Value::Bool)
            .ok_or_else(|| shape("Bool without boolean value")),
        "String" | "Character" => string(body, kind).map(Value::String),
        "Address" => string(body, kind).map(Value::Address),
        "Optional" => match body {
            None | Some(Json::Null) => Ok(Value::Optional(None)),
            Some(inner) => Ok(Value::Optional(Some(Box::new(decode_value(inner)?)))),
        },
        "Array" => body
            .and_then(Json::as_array)
            .ok_or_else(|| shape("Array without list value"))?
            .iter()
            .map(decode_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        "Dictionary" => body
            .and_then(Json::as_array)
            .ok_or_else(|| shape("Dictionary without entry list"))?
            .iter()
            .map(|entry| {
                let key = entry.get("key").ok_or_else(|| shape("entry without key"))?;
                let value = entry
                    .get("value")
                    .ok_or_else(|| shape("entry without value"))?;
                Ok((decode_value(key)?, decode_value(value)?))
            })
            .collect::<Result<Vec<_>, DecodeError>>()
            .map(Value::Dictionary),
        "Type" => {
            let static_type = body
                .and_then(|b| b.get("staticType"))
                .ok_or_else(|| shape("Type without staticType"))?;
            static_type_id(static_type)
                .map(|id| Value::Type(id.to_string()))
                .ok_or_else(|| shape("Type without resolvable type id"))
        }
        "Path" => {
            let body = body.ok_or_else(|| shape("Path without value"))?;
            let domain = body.get("domain").and_then(Json::as_str).unwrap_or_default();
            let ident = body
                .get("identifier")
                .and_then(Json::as_str)
                .unwrap_or_default();
            Ok(Value::Path(format!("/{domain}/{ident}")))
        }
        "Void" => Ok(Value::Void),
        k if COMPOSITE_KINDS.contains(&k) => {
            let body = body.ok_or_else(|| shape(format!("{k} without value")))?;
            let id = body
                .get("id")
                .and_then(Json::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(Value::Composite {
                id,
                fields: decode_fields(body)?,
            })
        }
        other => Ok(Value::Unsupported(other.to_string())),
    }
}

fn is_integer_tag(kind: &str) -> bool {
    ["UInt", "Int", "Word"].iter().any(|prefix| {
        kind.strip_prefix(prefix)
            .map(|bits| bits.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    })
}

fn integer(body: Option<&Json>, kind: &str) -> Result<String, DecodeError> {
    let text = string(body, kind)?;
    let digits = text.strip_prefix('-').unwrap_or(&text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(shape(format!("{kind} {text:?} is not an integer")));
    }
    Ok(text)
}

fn string(body: Option<&Json>, kind: &str) -> Result<String, DecodeError> {
    body.and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| shape(format!("{kind} without string value")))
}

/// Type id of a `staticType` node.
///
/// Older encoders emit the id as a bare string; newer ones nest it under
/// `typeID`, and optional/reference kinds wrap another static type.
fn static_type_id(static_type: &Json) -> Option<&str> {
    if let Some(id) = static_type.as_str() {
        return Some(id);
    }
    if let Some(id) = static_type.get("typeID").and_then(Json::as_str) {
        if !id.is_empty() {
            return Some(id);
        }
    }
    if let Some(inner) = static_type.get("type") {
        return static_type_id(inner);
    }
    static_type.get("kind").and_then(Json::as_str)
}

/// Convert an upstream field map that was already decoded by the event
/// source. Typed nodes still go through [`decode_value`]; everything else is
/// mapped loosely.
pub fn fields_from_map(map: &serde_json::Map<String, Json>) -> BTreeMap<String, Value> {
    map.iter()
        .map(|(name, raw)| {
            let value = match loose(raw) {
                Value::Optional(Some(inner)) => *inner,
                other => other,
            };
            (name.clone(), value)
        })
        .collect()
}

fn loose(raw: &Json) -> Value {
    match raw {
        Json::Null => Value::Optional(None),
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) if n.is_i64() || n.is_u64() => Value::Integer(n.to_string()),
        Json::Number(n) => Decimal::from_str(&n.to_string())
            .map(Value::Fixed)
            .unwrap_or_else(|_| Value::String(n.to_string())),
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::Array(items.iter().map(loose).collect()),
        Json::Object(map) => {
            let typed = map.get("type").map(Json::is_string).unwrap_or(false)
                && map.contains_key("value");
            if typed {
                if let Ok(value) = decode_value(raw) {
                    if !matches!(value, Value::Unsupported(_)) {
                        return value;
                    }
                }
            }
            Value::Object(map.iter().map(|(k, v)| (k.clone(), loose(v))).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(doc: &Json) -> Vec<u8> {
        BASE64.encode(doc.to_string()).into_bytes()
    }

    fn listing_completed() -> Json {
        json!({
            "type": "Event",
            "value": {
                "id": "A.4eb8a10cb9f87357.NFTStorefrontV2.ListingCompleted",
                "fields": [
                    { "name": "listingResourceID", "value": { "type": "UInt64", "value": "1099512872542" } },
                    { "name": "storefrontAddress", "value": { "type": "Address", "value": "0x5a14e0d6e2f9b3c1" } },
                    { "name": "purchased", "value": { "type": "Bool", "value": true } },
                    { "name": "nftType", "value": { "type": "Type", "value": {
                        "staticType": { "kind": "Resource", "typeID": "A.edf9df96c92f4595.Pinnacle.NFT", "fields": [] }
                    } } },
                    { "name": "nftID", "value": { "type": "UInt64", "value": "218764" } },
                    { "name": "salePaymentVaultType", "value": { "type": "Type", "value": {
                        "staticType": "A.ead892083b3e2c6c.DapperUtilityCoin.Vault"
                    } } },
                    { "name": "salePrice", "value": { "type": "UFix64", "value": "75.00000000" } },
                    { "name": "customID", "value": { "type": "Optional", "value": { "type": "String", "value": "dapper" } } },
                    { "name": "commissionReceiver", "value": { "type": "Optional", "value": null } }
                ]
            }
        })
    }

    #[test]
    fn test_decode_listing_completed() {
        let fields = decode_payload(&encode(&listing_completed())).unwrap();

        assert_eq!(fields["purchased"], Value::Bool(true));
        assert_eq!(fields["nftID"], Value::Integer("218764".to_string()));
        assert_eq!(
            fields["salePrice"],
            Value::Fixed(Decimal::from_str("75.00000000").unwrap())
        );
        assert_eq!(
            fields["nftType"],
            Value::Type("A.edf9df96c92f4595.Pinnacle.NFT".to_string())
        );
        assert_eq!(
            fields["salePaymentVaultType"],
            Value::Type("A.ead892083b3e2c6c.DapperUtilityCoin.Vault".to_string())
        );
        assert_eq!(
            fields["storefrontAddress"],
            Value::Address("0x5a14e0d6e2f9b3c1".to_string())
        );
        // One level of Optional is unwrapped; absence stays visible.
        assert_eq!(fields["customID"], Value::String("dapper".to_string()));
        assert!(fields["commissionReceiver"].is_absent());
    }

    #[test]
    fn test_nested_optional_unwraps_one_level_only() {
        let doc = json!({
            "type": "Event",
            "value": { "id": "A.x.C.E", "fields": [
                { "name": "to", "value": { "type": "Optional", "value":
                    { "type": "Optional", "value": { "type": "Address", "value": "0x0b2a3299cc857e29" } } } }
            ] }
        });
        let fields = decode_payload(&encode(&doc)).unwrap();
        assert_eq!(
            fields["to"],
            Value::Optional(Some(Box::new(Value::Address(
                "0x0b2a3299cc857e29".to_string()
            ))))
        );
    }

    #[test]
    fn test_composites_arrays_and_dictionaries() {
        let doc = json!({
            "type": "Struct",
            "value": { "id": "s.Pin", "fields": [
                { "name": "traits", "value": { "type": "Array", "value": [
                    { "type": "Struct", "value": { "id": "MetadataViews.Trait", "fields": [
                        { "name": "name", "value": { "type": "String", "value": "Characters" } },
                        { "name": "value", "value": { "type": "Array", "value": [
                            { "type": "String", "value": "Mickey Mouse" }
                        ] } }
                    ] } }
                ] } },
                { "name": "limits", "value": { "type": "Dictionary", "value": [
                    { "key": { "type": "String", "value": "max" }, "value": { "type": "Int", "value": "-5" } }
                ] } },
                { "name": "storage", "value": { "type": "Path", "value": { "domain": "storage", "identifier": "PinnacleCollection" } } },
                { "name": "cap", "value": { "type": "Capability", "value": { "address": "0x01" } } }
            ] }
        });
        let fields = decode_payload(&encode(&doc)).unwrap();

        let trait_name = match &fields["traits"] {
            Value::Array(items) => items[0].field("name").cloned(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(trait_name, Some(Value::String("Characters".to_string())));
        assert_eq!(
            fields["limits"],
            Value::Dictionary(vec![(
                Value::String("max".to_string()),
                Value::Integer("-5".to_string())
            )])
        );
        assert_eq!(fields["storage"], Value::Path("/storage/PinnacleCollection".to_string()));
        assert_eq!(fields["cap"], Value::Unsupported("Capability".to_string()));
    }

    #[test]
    fn test_decode_failures_are_total() {
        assert!(matches!(
            decode_payload(b"!!not base64!!"),
            Err(DecodeError::Base64(_))
        ));
        assert!(matches!(
            decode_payload(BASE64.encode("{ not json").as_bytes()),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode_payload(BASE64.encode([0xff, 0xfe, 0xfd]).as_bytes()),
            Err(DecodeError::Utf8(_))
        ));
        assert!(matches!(
            decode_payload(&encode(&json!({ "type": "UInt64", "value": "1" }))),
            Err(DecodeError::Shape(_))
        ));
        assert!(matches!(
            decode_payload(&encode(&json!({ "type": "Event", "value": { "id": "x" } }))),
            Err(DecodeError::Shape(_))
        ));
    }

    #[test]
    fn test_malformed_leaf_fails_whole_payload() {
        let doc = json!({
            "type": "Event",
            "value": { "id": "x", "fields": [
                { "name": "purchased", "value": { "type": "Bool", "value": true } },
                { "name": "nftID", "value": { "type": "UInt64", "value": "12a" } }
            ] }
        });
        assert!(matches!(
            decode_payload(&encode(&doc)),
            Err(DecodeError::Shape(_))
        ));
    }

    #[test]
    fn test_fields_from_predecoded_map() {
        let raw = json!({
            "purchased": true,
            "nftID": 218764,
            "salePrice": "10.00",
            "nftType": { "typeID": "A.edf9df96c92f4595.Pinnacle.NFT" },
            "storefrontAddress": { "type": "Address", "value": "0x5a14e0d6e2f9b3c1" },
            "commissionReceiver": null
        });
        let fields = fields_from_map(raw.as_object().unwrap());

        assert_eq!(fields["purchased"], Value::Bool(true));
        assert_eq!(fields["nftID"].id_string().as_deref(), Some("218764"));
        assert_eq!(
            fields["salePrice"].as_decimal(),
            Some(Decimal::from_str("10.00").unwrap())
        );
        assert_eq!(
            fields["nftType"].type_id(),
            Some("A.edf9df96c92f4595.Pinnacle.NFT")
        );
        assert_eq!(
            fields["storefrontAddress"],
            Value::Address("0x5a14e0d6e2f9b3c1".to_string())
        );
        assert!(fields["commissionReceiver"].is_absent());
    }
}

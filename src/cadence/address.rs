//! Address unwrapping for `Address?` style fields.
//!
//! Contract versions disagree on how an optional address is nested, and
//! pre-decoded events add their own free-form wrappers. Each known shape is a
//! matcher; they are tried in order and the first hit wins. New shapes go at
//! the end of [`MATCHERS`].

use crate::cadence::value::{Address, Value};
use tracing::trace;

type Matcher = fn(&Value) -> Option<&str>;

const MATCHERS: &[(&str, Matcher)] = &[
    ("bare", bare),
    ("inner-value", inner_value),
    ("nested-value", nested_value),
    ("address-attribute", address_attribute),
    ("deep-scan", deep_scan),
];

/// Resolve an address-like value, or `None` when no shape matches.
pub fn unwrap_address(value: &Value) -> Option<Address> {
    MATCHERS.iter().find_map(|(shape, matcher)| {
        matcher(value).filter(|s| !s.is_empty()).map(|s| {
            trace!(shape = *shape, address = s, "address unwrapped");
            Address::new(s)
        })
    })
}

fn bare(value: &Value) -> Option<&str> {
    value.as_str()
}

/// One level of wrapping: `Optional(x)` or `{ value: x }`.
fn inner(value: &Value) -> Option<&Value> {
    match value {
        Value::Optional(Some(inner)) => Some(inner),
        Value::Object(fields) | Value::Composite { fields, .. } => fields.get("value"),
        _ => None,
    }
}

fn inner_value(value: &Value) -> Option<&str> {
    inner(value).and_then(bare)
}

fn nested_value(value: &Value) -> Option<&str> {
    inner(value).and_then(inner).and_then(bare)
}

fn address_attribute(value: &Value) -> Option<&str> {
    let attr = match value {
        Value::Object(fields) | Value::Composite { fields, .. } => fields.get("address")?,
        _ => return None,
    };
    bare(attr).or_else(|| inner_value(attr))
}

fn deep_scan(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) | Value::Address(s) if Address::is_canonical(s) => Some(s),
        Value::Optional(Some(inner)) => deep_scan(inner),
        Value::Array(items) => items.iter().find_map(deep_scan),
        Value::Dictionary(entries) => entries
            .iter()
            .find_map(|(k, v)| deep_scan(k).or_else(|| deep_scan(v))),
        Value::Object(fields) | Value::Composite { fields, .. } => {
            fields.values().find_map(deep_scan)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const ADDR: &str = "0x1d7e57aa55817448";

    fn object(entries: &[(&str, Value)]) -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn test_bare_address_is_returned_unchanged() {
        let unwrapped = unwrap_address(&Value::Address(ADDR.to_string())).unwrap();
        assert_eq!(unwrapped.as_str(), ADDR);
        assert_eq!(
            unwrap_address(&Value::String(unwrapped.as_str().to_string())),
            Some(unwrapped)
        );
    }

    #[test]
    fn test_wrapped_shapes() {
        let addr = Value::Address(ADDR.to_string());
        let optional = Value::Optional(Some(Box::new(addr.clone())));
        let expected = Some(Address::new(ADDR));

        assert_eq!(unwrap_address(&optional), expected);
        assert_eq!(unwrap_address(&object(&[("value", addr.clone())])), expected);
        assert_eq!(
            unwrap_address(&Value::Optional(Some(Box::new(optional.clone())))),
            expected
        );
        assert_eq!(
            unwrap_address(&object(&[("value", object(&[("value", addr.clone())]))])),
            expected
        );
        assert_eq!(
            unwrap_address(&object(&[("address", addr.clone()), ("kind", Value::String("x".into()))])),
            expected
        );
    }

    #[test]
    fn test_deep_scan_only_accepts_canonical_addresses() {
        let nested = object(&[(
            "receiver",
            object(&[
                ("label", Value::String("not an address".into())),
                (
                    "path",
                    Value::Array(vec![Value::Integer("7".into()), Value::String(ADDR.into())]),
                ),
            ]),
        )]);
        assert_eq!(unwrap_address(&nested), Some(Address::new(ADDR)));

        let short = object(&[("inner", object(&[("x", Value::String("0x1234".into()))]))]);
        assert_eq!(unwrap_address(&short), None);
    }

    #[test]
    fn test_unresolvable_values_yield_none() {
        assert_eq!(unwrap_address(&Value::Optional(None)), None);
        assert_eq!(unwrap_address(&Value::Bool(true)), None);
        assert_eq!(unwrap_address(&Value::String(String::new())), None);
        assert_eq!(unwrap_address(&object(&[])), None);
    }
}

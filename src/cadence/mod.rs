//! Flow event payload handling.
//!
//! - `value`: the native [`Value`] tree JSON-Cadence nodes are reduced to
//! - `decode`: base64 payload → field map, failing as a whole on bad input
//! - `address`: layered unwrapping of address-like values
//! - `event`: raw and decoded event envelopes

pub mod address;
pub mod decode;
pub mod event;
pub mod value;

pub use address::unwrap_address;
pub use decode::{decode_payload, decode_value, DecodeError};
pub use event::{DecodedEvent, EventData, RawEvent};
pub use value::{Address, Value};

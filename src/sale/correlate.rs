//! Seller/buyer resolution from a transaction's transfer events.
//!
//! A sale moves the token out of the seller's collection (`Withdrawn`) and
//! into the buyer's (`Deposited`). Matching is by token id compared as a
//! string so large ids never lose precision.

use crate::cadence::{unwrap_address, Address, DecodedEvent, RawEvent};
use tracing::debug;

pub const UNKNOWN_SELLER: &str = "UnknownSeller";
pub const UNKNOWN_BUYER: &str = "UnknownBuyer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Party {
    Resolved(Address),
    Unresolved,
}

impl Party {
    pub fn address(&self) -> Option<&Address> {
        match self {
            Party::Resolved(addr) => Some(addr),
            Party::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Party::Resolved(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parties {
    pub seller: Party,
    pub buyer: Party,
}

impl Parties {
    pub fn unresolved() -> Self {
        Self {
            seller: Party::Unresolved,
            buyer: Party::Unresolved,
        }
    }

    /// Seller address, or the `UnknownSeller` sentinel.
    pub fn seller_label(&self) -> String {
        label(&self.seller, UNKNOWN_SELLER)
    }

    /// Buyer address, or the `UnknownBuyer` sentinel.
    pub fn buyer_label(&self) -> String {
        label(&self.buyer, UNKNOWN_BUYER)
    }

    /// Neither side found.
    pub fn is_unresolved(&self) -> bool {
        !self.seller.is_resolved() && !self.buyer.is_resolved()
    }
}

fn label(party: &Party, sentinel: &str) -> String {
    party
        .address()
        .map(|a| a.to_string())
        .unwrap_or_else(|| sentinel.to_string())
}

/// How transfer event types are recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferMatch {
    /// Exact type identifiers, e.g. `A.1d7e57aa55817448.NonFungibleToken.Withdrawn`.
    Exact { withdrawn: String, deposited: String },
    /// Type suffixes, for contract-specific families such as `.PackNFT.Withdraw`.
    Suffix { withdrawn: String, deposited: String },
}

impl TransferMatch {
    pub fn non_fungible_token(contract_address: &str) -> Self {
        let prefix = format!("A.{}.NonFungibleToken", contract_address.trim_start_matches("0x"));
        TransferMatch::Exact {
            withdrawn: format!("{prefix}.Withdrawn"),
            deposited: format!("{prefix}.Deposited"),
        }
    }

    pub fn pack_nft() -> Self {
        TransferMatch::Suffix {
            withdrawn: ".PackNFT.Withdraw".to_string(),
            deposited: ".PackNFT.Deposit".to_string(),
        }
    }

    fn side(&self, event_type: &str) -> Option<Side> {
        let (withdrawn, deposited, exact) = match self {
            TransferMatch::Exact { withdrawn, deposited } => (withdrawn, deposited, true),
            TransferMatch::Suffix { withdrawn, deposited } => (withdrawn, deposited, false),
        };
        let hit = |pattern: &str| {
            if exact {
                event_type == pattern
            } else {
                event_type.ends_with(pattern)
            }
        };
        if hit(withdrawn) {
            Some(Side::Withdrawn)
        } else if hit(deposited) {
            Some(Side::Deposited)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Withdrawn,
    Deposited,
}

#[derive(Debug, Clone)]
pub struct TransferCorrelator {
    matcher: TransferMatch,
}

impl TransferCorrelator {
    pub fn new(matcher: TransferMatch) -> Self {
        Self { matcher }
    }

    /// Scan `events` in order; the last matching transfer wins per side.
    /// Events of other types are never decoded.
    pub fn correlate(&self, events: &[RawEvent], token_id: &str) -> Parties {
        let mut parties = Parties::unresolved();

        for raw in events {
            let Some(side) = self.matcher.side(&raw.event_type) else {
                continue;
            };
            let event = match DecodedEvent::decode(raw.clone()) {
                Ok(event) => event,
                Err(e) => {
                    debug!(
                        tx_id = %raw.transaction_id,
                        event_type = %raw.event_type,
                        error = %e,
                        "skipping undecodable transfer event"
                    );
                    continue;
                }
            };

            let id = event.field("id").and_then(|v| v.id_string());
            if id.as_deref() != Some(token_id) {
                continue;
            }

            let (field, slot) = match side {
                Side::Withdrawn => ("from", &mut parties.seller),
                Side::Deposited => ("to", &mut parties.buyer),
            };
            if let Some(addr) = event.field(field).and_then(unwrap_address) {
                *slot = Party::Resolved(addr);
            }
        }

        parties
    }
}

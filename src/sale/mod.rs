//! Sale classification and enrichment.
//!
//! - `gate`: decides whether a decoded listing event is an in-scope sale
//! - `correlate`: resolves seller and buyer from transfer events

pub mod correlate;
pub mod gate;

pub use correlate::{Parties, Party, TransferCorrelator, TransferMatch};
pub use gate::{GateConfig, GateResult, PricedSale, Rejection, SaleCandidate, SaleEventGate};

use crate::cadence::Address;
use rust_decimal::Decimal;
use serde::Serialize;

/// Marketplace a listing event came from, by contract name in its type.
pub fn marketplace_source(event_type: &str) -> &'static str {
    if event_type.contains(".NFTStorefrontV2.") {
        "NFTStorefrontV2"
    } else if event_type.contains(".OffersV2.") {
        "OffersV2"
    } else {
        "Unknown"
    }
}

/// Everything known about one matched sale, handed to the notifier once.
#[derive(Debug, Clone, Serialize)]
pub struct SaleRecord {
    pub token_type: String,
    pub token_id: String,
    pub token_uuid: Option<String>,
    pub transaction_id: String,
    pub raw_amount: Decimal,
    pub vault_type: String,
    pub usd_price: Decimal,
    pub display_price: String,
    pub marketplace: &'static str,
    pub storefront: Option<Address>,
    pub seller: String,
    pub buyer: String,
}

impl SaleRecord {
    /// `parties` sentinels are applied here; an unresolved seller falls
    /// back to the storefront owner when the listing carried one.
    pub fn new(sale: PricedSale, token_id: String, parties: &Parties, display_price: String) -> Self {
        let seller = match (&parties.seller, &sale.candidate.storefront) {
            (Party::Unresolved, Some(storefront)) => storefront.to_string(),
            _ => parties.seller_label(),
        };
        let candidate = sale.candidate;
        Self {
            token_type: candidate.token_type,
            token_id,
            token_uuid: candidate.token_uuid,
            transaction_id: candidate.transaction_id,
            raw_amount: candidate.raw_amount,
            vault_type: candidate.vault_type,
            usd_price: sale.usd,
            display_price,
            marketplace: candidate.marketplace,
            storefront: candidate.storefront,
            seller,
            buyer: parties.buyer_label(),
        }
    }

    /// Address to look the token up under: the buyer now owns it, the
    /// seller is the next best guess.
    pub fn owner_hint(&self) -> Option<Address> {
        [&self.buyer, &self.seller]
            .into_iter()
            .find(|s| Address::is_canonical(s))
            .map(|s| Address::new(s.as_str()))
    }
}

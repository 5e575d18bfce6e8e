//! In-scope decision for decoded `ListingCompleted` events.
//!
//! Rules run in order and stop at the first failure:
//!
//! 1. `nftType` is the tracked collection type
//! 2. `purchased` is true
//! 3. the sale amount is a positive decimal
//! 4. the amount can be priced in USD
//! 5. the USD price clears the threshold (skipped in dry-run)
//!
//! Rules 1-3 need only the event ([`SaleEventGate::inspect`]); 4-5 need a
//! price ([`SaleEventGate::check_price`]). [`SaleEventGate::accept`] runs both.

use crate::cadence::{unwrap_address, Address, DecodedEvent};
use crate::price::PriceConverter;
use crate::sale::marketplace_source;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    pub tracked_type: String,
    pub threshold_usd: Decimal,
    pub dry_run: bool,
}

/// Why an event was filtered out. Expected outcomes, not failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("untracked nft type {found:?}")]
    WrongType { found: Option<String> },
    #[error("listing not purchased")]
    NotPurchased,
    #[error("no positive sale price")]
    NoSalePrice,
    #[error("price unavailable for vault {vault_type}")]
    PriceUnavailable { vault_type: String },
    #[error("below threshold: ${usd} < ${threshold}")]
    BelowThreshold { usd: Decimal, threshold: Decimal },
}

/// An event that passed rules 1-3.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleCandidate {
    pub token_type: String,
    pub token_id: Option<String>,
    pub token_uuid: Option<String>,
    pub transaction_id: String,
    pub raw_amount: Decimal,
    pub vault_type: String,
    pub storefront: Option<Address>,
    pub marketplace: &'static str,
}

/// A candidate with its USD price resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedSale {
    pub candidate: SaleCandidate,
    pub usd: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateResult {
    Accepted(PricedSale),
    Rejected(Rejection),
}

#[derive(Debug, Clone)]
pub struct SaleEventGate {
    config: GateConfig,
}

impl SaleEventGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Rules 1-3.
    pub fn inspect(&self, event: &DecodedEvent) -> Result<SaleCandidate, Rejection> {
        let token_type = event.field("nftType").and_then(|v| v.type_id());
        if token_type != Some(self.config.tracked_type.as_str()) {
            return Err(Rejection::WrongType {
                found: token_type.map(str::to_string),
            });
        }

        if event.field("purchased").and_then(|v| v.as_bool()) != Some(true) {
            return Err(Rejection::NotPurchased);
        }

        let raw_amount = event
            .field("salePrice")
            .or_else(|| event.field("price"))
            .and_then(|v| v.as_decimal())
            .filter(|amount| *amount > Decimal::ZERO)
            .ok_or(Rejection::NoSalePrice)?;

        Ok(SaleCandidate {
            token_type: self.config.tracked_type.clone(),
            token_id: event.field("nftID").and_then(|v| v.id_string()),
            token_uuid: event.field("nftUUID").and_then(|v| v.id_string()),
            transaction_id: event.transaction_id().to_string(),
            raw_amount,
            vault_type: event
                .field("salePaymentVaultType")
                .and_then(|v| v.type_id())
                .unwrap_or_default()
                .to_string(),
            storefront: event.field("storefrontAddress").and_then(unwrap_address),
            marketplace: marketplace_source(event.event_type()),
        })
    }

    /// Rules 4-5 for a price resolved by the caller.
    pub fn check_price(&self, candidate: SaleCandidate, usd: Option<Decimal>) -> GateResult {
        let Some(usd) = usd else {
            return GateResult::Rejected(Rejection::PriceUnavailable {
                vault_type: candidate.vault_type,
            });
        };
        if !self.config.dry_run && usd < self.config.threshold_usd {
            return GateResult::Rejected(Rejection::BelowThreshold {
                usd,
                threshold: self.config.threshold_usd,
            });
        }
        GateResult::Accepted(PricedSale { candidate, usd })
    }

    pub async fn accept(&self, event: &DecodedEvent, converter: &mut PriceConverter) -> GateResult {
        let candidate = match self.inspect(event) {
            Ok(candidate) => candidate,
            Err(rejection) => return GateResult::Rejected(rejection),
        };
        let usd = converter
            .usd_price(&candidate.vault_type, candidate.raw_amount)
            .await;
        self.check_price(candidate, usd)
    }
}

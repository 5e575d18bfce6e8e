//! Per-event sale pipeline.
//!
//! decode → dedup → gate → fetch → correlate → metadata → compose → post.
//! Every failure is recovered here; one event never affects another.

use crate::cadence::{DecodedEvent, RawEvent};
use crate::flow::TransactionFetcher;
use crate::metadata::{EditionLookup, EditionRecord};
use crate::monitor::audit::{AuditKind, AuditLog};
use crate::monitor::stats::Stats;
use crate::notify::{compose_fallback, compose_sale, FallbackReason, Notifier, Post, PostStyle};
use crate::price::PriceConverter;
use crate::sale::{GateResult, Rejection, SaleEventGate, SaleRecord, TransferCorrelator};
use serde_json::json;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Stages that decide whether and how much a sale is worth.
pub struct Pipeline {
    pub gate: SaleEventGate,
    pub converter: PriceConverter,
    pub fetcher: TransactionFetcher,
    pub correlator: TransferCorrelator,
}

/// Stages that turn a sale into a post.
pub struct Publishing {
    pub metadata: Arc<dyn EditionLookup>,
    pub notifier: Arc<dyn Notifier>,
    pub style: PostStyle,
    pub image_base_url: String,
    pub audit: AuditLog,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Decode(String),
    MissingTokenId,
    Fetch(String),
    CorrelationUnresolved,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Decode(e) => write!(f, "decode failed: {e}"),
            SkipReason::MissingTokenId => write!(f, "listing without nftID"),
            SkipReason::Fetch(e) => write!(f, "transaction fetch failed: {e}"),
            SkipReason::CorrelationUnresolved => write!(f, "neither seller nor buyer resolved"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Transaction already posted during this process lifetime.
    Duplicate,
    Skipped(SkipReason),
    Rejected(Rejection),
    Posted,
    /// Dry-run equivalent of `Posted`.
    WouldPost,
    PostFailed,
}

pub struct SaleHandler {
    pipeline: Pipeline,
    publishing: Publishing,
    posted: HashSet<String>,
    pub stats: Stats,
}

impl SaleHandler {
    pub fn new(pipeline: Pipeline, publishing: Publishing, status_interval: Duration) -> Self {
        Self {
            pipeline,
            publishing,
            posted: HashSet::new(),
            stats: Stats::new(status_interval),
        }
    }

    pub fn is_posted(&self, tx_id: &str) -> bool {
        self.posted.contains(tx_id)
    }

    pub async fn handle(&mut self, raw: RawEvent) -> Outcome {
        self.stats.events += 1;
        let tx_id = raw.transaction_id.clone();

        let event = match DecodedEvent::decode(raw) {
            Ok(event) => event,
            Err(e) => return self.skip(&tx_id, SkipReason::Decode(e.to_string()), json!({})),
        };

        if self.posted.contains(&tx_id) {
            debug!(tx_id = %tx_id, "already posted");
            return Outcome::Duplicate;
        }

        let sale = match self
            .pipeline
            .gate
            .accept(&event, &mut self.pipeline.converter)
            .await
        {
            GateResult::Accepted(sale) => sale,
            GateResult::Rejected(rejection) => return self.reject(&event, rejection),
        };
        self.stats.in_scope += 1;

        let Some(token_id) = sale.candidate.token_id.clone() else {
            return self.skip(&tx_id, SkipReason::MissingTokenId, event.fields_json());
        };

        let tx_events = match self.pipeline.fetcher.fetch(&tx_id).await {
            Ok(events) => events,
            Err(e) => {
                return self.skip(&tx_id, SkipReason::Fetch(e.to_string()), event.fields_json())
            }
        };

        let parties = self.pipeline.correlator.correlate(&tx_events, &token_id);
        if parties.is_unresolved() && sale.candidate.storefront.is_none() {
            return self.skip(&tx_id, SkipReason::CorrelationUnresolved, event.fields_json());
        }

        let display_price = self.pipeline.converter.display_price(
            &sale.candidate.vault_type,
            sale.candidate.raw_amount,
            sale.usd,
        );
        let record = SaleRecord::new(sale, token_id, &parties, display_price);
        info!(
            tx_id = %tx_id,
            token_id = %record.token_id,
            usd = %record.usd_price,
            seller = %record.seller,
            buyer = %record.buyer,
            marketplace = record.marketplace,
            "sale matched"
        );

        let post = self.compose(&record).await;
        self.publish(record, post).await
    }

    async fn compose(&self, record: &SaleRecord) -> Post {
        let publishing = &self.publishing;
        let fallback = |reason| Post::text_only(compose_fallback(record, reason, &publishing.style));

        let Some(owner) = record.owner_hint() else {
            return fallback(FallbackReason::AddressUnknown);
        };
        let pin = match publishing.metadata.pin(&owner, &record.token_id).await {
            Ok(Some(pin)) => pin,
            Ok(None) => {
                warn!(tx_id = %record.transaction_id, owner = %owner, "pin not found");
                return fallback(FallbackReason::NotFound);
            }
            Err(e) => {
                warn!(tx_id = %record.transaction_id, error = %e, "pin lookup failed");
                return fallback(FallbackReason::LookupFailed);
            }
        };

        let edition = match publishing.metadata.edition(&pin.edition_id).await {
            Ok(Some(edition)) => edition,
            Ok(None) => {
                warn!(
                    tx_id = %record.transaction_id,
                    edition_id = %pin.edition_id,
                    "edition lookup returned nothing"
                );
                EditionRecord::unknown()
            }
            Err(e) => {
                warn!(
                    tx_id = %record.transaction_id,
                    edition_id = %pin.edition_id,
                    error = %e,
                    "edition lookup failed"
                );
                EditionRecord::unknown()
            }
        };

        let (image_url, fallback_image_url) = match edition.image_urls(&publishing.image_base_url) {
            Some((front, cropped)) => (Some(front), Some(cropped)),
            None => (None, None),
        };
        Post {
            text: compose_sale(record, &pin, &edition, &publishing.style),
            image_url,
            fallback_image_url,
        }
    }

    async fn publish(&mut self, record: SaleRecord, post: Post) -> Outcome {
        let tx_id = record.transaction_id.clone();
        let entry = json!({
            "tx_id": tx_id,
            "sale": record,
            "text": post.text,
            "image_url": post.image_url,
        });

        match self.publishing.notifier.post(&post).await {
            Ok(()) => {
                self.posted.insert(tx_id.clone());
                self.stats.posted += 1;
                self.publishing.audit.record(AuditKind::Posted, entry);
                if self.pipeline.gate.config().dry_run {
                    Outcome::WouldPost
                } else {
                    info!(tx_id = %tx_id, "sale posted");
                    Outcome::Posted
                }
            }
            Err(e) => {
                error!(tx_id = %tx_id, error = %e, "post failed");
                let mut entry = entry;
                entry["error"] = json!(e.to_string());
                self.publishing.audit.record(AuditKind::Failed, entry);
                Outcome::PostFailed
            }
        }
    }

    fn skip(&mut self, tx_id: &str, reason: SkipReason, fields: serde_json::Value) -> Outcome {
        warn!(tx_id = %tx_id, reason = %reason, "event skipped");
        self.stats.skipped += 1;
        self.publishing.audit.record(
            AuditKind::Skipped,
            json!({ "tx_id": tx_id, "reason": reason.to_string(), "fields": fields }),
        );
        Outcome::Skipped(reason)
    }

    fn reject(&mut self, event: &DecodedEvent, rejection: Rejection) -> Outcome {
        let tx_id = event.transaction_id();
        match &rejection {
            Rejection::BelowThreshold { usd, threshold } => {
                self.stats.in_scope += 1;
                self.stats.below_threshold += 1;
                info!(tx_id = %tx_id, usd = %usd, threshold = %threshold, "below threshold");
            }
            Rejection::PriceUnavailable { vault_type } => {
                self.stats.skipped += 1;
                warn!(tx_id = %tx_id, vault_type = %vault_type, "sale could not be priced");
                self.publishing.audit.record(
                    AuditKind::Skipped,
                    json!({
                        "tx_id": tx_id,
                        "reason": rejection.to_string(),
                        "fields": event.fields_json(),
                    }),
                );
            }
            other => debug!(tx_id = %tx_id, reason = %other, "event filtered"),
        }
        Outcome::Rejected(rejection)
    }
}

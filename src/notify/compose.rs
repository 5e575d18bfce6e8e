//! Post text for a matched sale.

use crate::metadata::{EditionRecord, PinRecord};
use crate::sale::SaleRecord;
use std::fmt;

/// Account mention and site used in post text.
#[derive(Debug, Clone, PartialEq)]
pub struct PostStyle {
    pub handle: String,
    pub site_url: String,
}

/// Why a post went out without pin metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// Neither buyer nor seller resolved to an address to query.
    AddressUnknown,
    /// The lookup itself failed.
    LookupFailed,
    /// The lookup ran but found nothing.
    NotFound,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FallbackReason::AddressUnknown => "Could not fetch metadata - address unknown",
            FallbackReason::LookupFailed => "Error fetching metadata",
            FallbackReason::NotFound => "Could not fetch metadata - script returned null",
        })
    }
}

/// Addresses are shown with a single `0x` prefix; sentinels pass through.
fn party(raw: &str) -> String {
    let hex = raw.strip_prefix("0x").unwrap_or(raw);
    if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        format!("0x{hex}")
    } else {
        raw.to_string()
    }
}

pub fn compose_sale(
    record: &SaleRecord,
    pin: &PinRecord,
    edition: &EditionRecord,
    style: &PostStyle,
) -> String {
    let set_name = pin
        .trait_values("SetName")
        .and_then(|v| v.first())
        .map(String::as_str)
        .unwrap_or("Unknown Set");
    let characters = pin
        .trait_values("Characters")
        .map(|v| v.join(", "))
        .unwrap_or_else(|| "N/A".to_string());

    let mut lines = vec![
        format!("{} SALE on {}", record.display_price, style.handle),
        set_name.to_string(),
    ];
    if let Some(serial) = &pin.serial_number {
        lines.push(format!("Serial #: {serial}"));
    }
    lines.push(format!(
        "Max Mint: {}",
        edition.max_mint_size.as_deref().unwrap_or("N/A")
    ));
    lines.push(format!("Character(s): {characters}"));
    lines.push(format!("Edition ID: {}", pin.edition_id));
    lines.push(format!("Seller: {}", party(&record.seller)));
    lines.push(format!("Buyer: {}", party(&record.buyer)));
    lines.push(format!(
        "{}/pin/{}",
        style.site_url.trim_end_matches('/'),
        pin.edition_id
    ));
    lines.join("\n")
}

pub fn compose_fallback(record: &SaleRecord, reason: FallbackReason, style: &PostStyle) -> String {
    [
        format!("{} SALE on {}", record.display_price, style.handle),
        format!("Unknown Pin (ID: {})", record.token_id),
        format!("Seller: {}", party(&record.seller)),
        format!("Buyer: {}", party(&record.buyer)),
        format!("({reason})"),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Trait;
    use rust_decimal::Decimal;

    fn style() -> PostStyle {
        PostStyle {
            handle: "@DisneyPinnacle".to_string(),
            site_url: "https://disneypinnacle.com".to_string(),
        }
    }

    fn record(seller: &str, buyer: &str) -> SaleRecord {
        SaleRecord {
            token_type: "A.edf9df96c92f4595.Pinnacle.NFT".to_string(),
            token_id: "4242".to_string(),
            token_uuid: None,
            transaction_id: "c0ffee".to_string(),
            raw_amount: Decimal::new(75, 0),
            vault_type: "A.ead892083b3e2c6c.DapperUtilityCoin.Vault".to_string(),
            usd_price: Decimal::new(75, 0),
            display_price: "$75.00 USD".to_string(),
            marketplace: "NFTStorefrontV2",
            storefront: None,
            seller: seller.to_string(),
            buyer: buyer.to_string(),
        }
    }

    #[test]
    fn test_compose_sale() {
        let pin = PinRecord {
            edition_id: "1187".to_string(),
            serial_number: Some("12".to_string()),
            traits: vec![
                Trait {
                    name: "SetName".to_string(),
                    values: vec!["Villains".to_string()],
                },
                Trait {
                    name: "Characters".to_string(),
                    values: vec!["Maleficent".to_string(), "Diablo".to_string()],
                },
            ],
        };
        let edition = EditionRecord {
            render_id: Some("abc".to_string()),
            max_mint_size: Some("2500".to_string()),
        };

        let text = compose_sale(
            &record("0xaaaaaaaaaaaaaaaa", "bbbbbbbbbbbbbbbb"),
            &pin,
            &edition,
            &style(),
        );

        assert_eq!(
            text,
            "$75.00 USD SALE on @DisneyPinnacle\n\
             Villains\n\
             Serial #: 12\n\
             Max Mint: 2500\n\
             Character(s): Maleficent, Diablo\n\
             Edition ID: 1187\n\
             Seller: 0xaaaaaaaaaaaaaaaa\n\
             Buyer: 0xbbbbbbbbbbbbbbbb\n\
             https://disneypinnacle.com/pin/1187"
        );
    }

    #[test]
    fn test_compose_sale_defaults() {
        let pin = PinRecord {
            edition_id: "9".to_string(),
            serial_number: None,
            traits: vec![],
        };
        let edition = EditionRecord {
            render_id: None,
            max_mint_size: None,
        };

        let text = compose_sale(&record("0xaaaaaaaaaaaaaaaa", "0xbbbbbbbbbbbbbbbb"), &pin, &edition, &style());

        assert!(text.contains("\nUnknown Set\n"));
        assert!(!text.contains("Serial #"));
        assert!(text.contains("Max Mint: N/A"));
        assert!(text.contains("Character(s): N/A"));
    }

    #[test]
    fn test_compose_fallback_keeps_sentinels() {
        let text = compose_fallback(
            &record("UnknownSeller", "0xbbbbbbbbbbbbbbbb"),
            FallbackReason::NotFound,
            &style(),
        );

        assert_eq!(
            text,
            "$75.00 USD SALE on @DisneyPinnacle\n\
             Unknown Pin (ID: 4242)\n\
             Seller: UnknownSeller\n\
             Buyer: 0xbbbbbbbbbbbbbbbb\n\
             (Could not fetch metadata - script returned null)"
        );
    }
}

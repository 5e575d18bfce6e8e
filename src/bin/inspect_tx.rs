//! Print every event of a Flow transaction with its decoded fields.
//!
//! Usage:
//!   cargo run --bin inspect_tx -- <TX_ID>               # dump events
//!   cargo run --bin inspect_tx -- <TX_ID> <TOKEN_ID>    # also resolve seller/buyer

use anyhow::{bail, Result};
use pinbot::cadence::DecodedEvent;
use pinbot::config::Config;
use pinbot::flow::FlowClient;
use pinbot::sale::{TransferCorrelator, TransferMatch};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(tx_id) = args.first() else {
        eprintln!("Usage: cargo run --bin inspect_tx -- <TX_ID> [TOKEN_ID]");
        std::process::exit(1);
    };
    let token_id = args.get(1);

    let config = Config::load(Path::new("pinbot.toml")).unwrap_or_else(|_| Config::from_env());
    let client = FlowClient::new(&config.flow.rest_url);

    eprintln!("Fetching transaction results for {tx_id}...");
    let Some(result) = client.transaction_result(tx_id).await? else {
        bail!("transaction {tx_id} not found (not sealed or not indexed yet)");
    };
    eprintln!(
        "  → status {}, {} events{}",
        result.status,
        result.events.len(),
        if result.error_message.is_empty() {
            String::new()
        } else {
            format!(", error: {}", result.error_message)
        }
    );

    let events: Vec<_> = result.events.into_iter().map(|e| e.into_raw(None)).collect();

    for raw in &events {
        println!();
        println!("── #{} {}", raw.event_index, raw.event_type);
        match DecodedEvent::decode(raw.clone()) {
            Ok(decoded) => println!("{}", serde_json::to_string_pretty(&decoded.fields_json())?),
            Err(e) => println!("   (undecodable: {e})"),
        }
    }

    if let Some(token_id) = token_id {
        let standard = TransferCorrelator::new(TransferMatch::non_fungible_token(
            &config.flow.nft_standard_address,
        ))
        .correlate(&events, token_id);
        let packs = TransferCorrelator::new(TransferMatch::pack_nft()).correlate(&events, token_id);

        println!();
        println!("Token {token_id}");
        println!("  NonFungibleToken  seller: {}  buyer: {}", standard.seller_label(), standard.buyer_label());
        println!("  PackNFT           seller: {}  buyer: {}", packs.seller_label(), packs.buyer_label());
    }

    Ok(())
}

//! Run the configured metadata scripts by hand.
//!
//! Usage:
//!   cargo run --bin inspect_pin -- pin <ADDRESS> <NFT_ID>
//!   cargo run --bin inspect_pin -- edition <EDITION_ID>

use anyhow::{bail, Context, Result};
use pinbot::cadence::Address;
use pinbot::config::Config;
use pinbot::flow::FlowClient;
use pinbot::metadata::{EditionLookup, ScriptMetadata};
use std::path::Path;

fn usage() -> ! {
    eprintln!("Usage: cargo run --bin inspect_pin -- pin <ADDRESS> <NFT_ID>");
    eprintln!("       cargo run --bin inspect_pin -- edition <EDITION_ID>");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::load(Path::new("pinbot.toml")).unwrap_or_else(|_| Config::from_env());

    let (Some(pin_script), Some(edition_script)) =
        (&config.metadata.pin_script, &config.metadata.edition_script)
    else {
        bail!("metadata.pin_script and metadata.edition_script must be set in pinbot.toml");
    };
    let lookup = ScriptMetadata::load(
        FlowClient::new(&config.flow.rest_url),
        Path::new(pin_script),
        Path::new(edition_script),
        config.retry_policy(),
    )
    .context("loading metadata scripts")?;

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["pin", address, nft_id] => {
            let owner = Address::new(*address);
            eprintln!("Running pin script for NFT {nft_id} owned by {owner}...");
            match lookup.pin(&owner, nft_id).await? {
                Some(pin) => println!("{}", serde_json::to_string_pretty(&pin)?),
                None => println!("null"),
            }
        }
        ["edition", edition_id] => {
            eprintln!("Running edition script for edition {edition_id}...");
            match lookup.edition(edition_id).await? {
                Some(edition) => {
                    println!("{}", serde_json::to_string_pretty(&edition)?);
                    if let Some((front, cropped)) = edition.image_urls(&config.metadata.image_base_url) {
                        println!("image: {front}");
                        println!("       {cropped}");
                    }
                }
                None => println!("null"),
            }
        }
        _ => usage(),
    }

    Ok(())
}

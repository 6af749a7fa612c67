//! Follow the Wave Portal feed from a local node.
//!
//! ```bash
//! RUST_LOG=waveportal_sdk=debug cargo run --features native --example watch_waves
//! ```
//!
//! `WAVEPORTAL_RPC_URL`, `WAVEPORTAL_WS_URL` and `WAVEPORTAL_ADDRESS` override
//! the defaults; a `.env` file is honoured.

use waveportal_sdk::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), SdkError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut builder = WavePortal::builder();
    if let Ok(url) = std::env::var("WAVEPORTAL_RPC_URL") {
        builder = builder.rpc_url(&url);
    }
    if let Ok(url) = std::env::var("WAVEPORTAL_WS_URL") {
        builder = builder.ws_url(&url);
    }
    if let Ok(address) = std::env::var("WAVEPORTAL_ADDRESS") {
        builder = builder.contract_address(&address);
    }

    let portal = builder.build_http()?;
    portal.on_messages_changed(|store| {
        if let Some(latest) = store.latest() {
            println!(
                "[{}] {} waved: {} ({} total)",
                latest.timestamp.format("%Y-%m-%d %H:%M:%S"),
                latest.sender,
                latest.text,
                store.len()
            );
        }
    });

    portal.start().await;
    for wave in portal.messages() {
        println!("{} - {}: {}", wave.timestamp, wave.sender, wave.text);
    }

    loop {
        tokio::select! {
            pumped = portal.pump() => match pumped {
                Ok(Pumped::Ended) => break,
                Ok(_) => {}
                Err(e) => tracing::warn!("Feed error: {}", e),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    portal.shutdown();
    Ok(())
}

//! Send one wave from the node's first unlocked account.
//!
//! ```bash
//! cargo run --features native --example send_wave -- "gm"
//! ```

use waveportal_sdk::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), SdkError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let text = std::env::args().skip(1).collect::<Vec<_>>().join(" ");

    let mut builder = WavePortal::builder();
    if let Ok(url) = std::env::var("WAVEPORTAL_RPC_URL") {
        builder = builder.rpc_url(&url);
    }
    if let Ok(address) = std::env::var("WAVEPORTAL_ADDRESS") {
        builder = builder.contract_address(&address);
    }
    let portal = builder.build_http()?;

    portal.on_transaction_state(|state| match state {
        TransactionState::AwaitingConfirmation { tx_hash } => println!("Mining -- {}", tx_hash),
        TransactionState::Confirmed { tx_hash, .. } => println!("Mined -- {}", tx_hash),
        TransactionState::Failed { kind, message } => println!("Failed ({:?}): {}", kind, message),
        _ => {}
    });

    portal.start().await;
    let account = portal.connect_wallet().await?;
    println!("Connected {}", account);

    portal.wave(&text).await?;
    println!("Total waves: {}", portal.total_waves().await?);

    portal.shutdown();
    Ok(())
}

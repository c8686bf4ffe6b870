//! Example: Diagnosing which MediSync origin is reachable
//!
//! Loads the configuration (file plus `MEDISYNC_*` variables), probes every
//! candidate origin for the detected platform and prints the results.
//!
//! # Usage
//!
//! ```bash
//! MEDISYNC_NATIVE_BRIDGE=1 cargo run -p medisync-infra --example connectivity_check
//! ```

use medisync_infra::{config, init_tracing, MediSync};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load()?;
    init_tracing(&config.logging);

    let client = MediSync::from_environment(&config)?;
    let resolver = client.resolver();

    println!("MediSync Connectivity Check");
    println!("===========================\n");

    let info = resolver.network_info();
    println!("{}", serde_json::to_string_pretty(&info)?);
    println!();

    for origin in resolver.candidate_origins() {
        let result = resolver.test_endpoint(&origin).await;
        let mark = if result.success { "✓" } else { "✗" };
        println!(
            "{mark} {:<40} {:>6}ms  {}",
            result.endpoint,
            result.response_time.as_millis(),
            result.outcome
        );
    }

    match resolver.optimize_endpoint().await {
        Some(origin) => println!("\nSwitched to {origin}"),
        None => println!("\nKeeping {}", resolver.active().get()),
    }

    Ok(())
}

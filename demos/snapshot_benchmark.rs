use market_snapshot_sdk::{MarketSnapshotOrchestrator, SnapshotConfig, SnapshotOptions};
use std::time::{Duration, Instant};

const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = MarketSnapshotOrchestrator::new(SnapshotConfig::from_env()?)?;

    println!("Benchmarking Market Snapshot SDK (Token: wSOL, Chain: solana)...");
    println!("-------------------------------------------");

    // 1. Cold fetch goes through the provider chain
    println!("1. Cold fetch (provider chain)...");
    let start_api = Instant::now();
    let snapshot = match orchestrator
        .get_token_snapshot(SOL_MINT, "solana", SnapshotOptions::force_refresh())
        .await
    {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("   Error: snapshot unavailable: {}", e);
            return Ok(());
        }
    };
    let api_latency = start_api.elapsed();

    println!("   Price:     ${:.4}", snapshot.price());
    println!("   Volume:    ${:.0}", snapshot.snapshot.volume);
    println!("   Liquidity: ${:.0}", snapshot.snapshot.liquidity);
    println!("   Provider:  {}", snapshot.provider);
    println!("   Latency:   {:?}", api_latency);
    println!();

    // 2. Fresh cache hits
    println!("2. Fresh cache hits...");
    let iterations: u32 = 10_000;
    let mut total_cache_latency = Duration::default();

    for _ in 0..iterations {
        let start = Instant::now();
        let _ = orchestrator
            .get_token_snapshot(SOL_MINT, "solana", SnapshotOptions::default())
            .await?;
        total_cache_latency += start.elapsed();
    }

    let avg_cache_latency = total_cache_latency / iterations;
    println!("   Total iterations: {}", iterations);
    println!("   Average latency (per call): {:?}", avg_cache_latency);
    println!();

    println!("-------------------------------------------");
    println!("Performance Summary:");
    println!("- Provider latency: {:?}", api_latency);
    println!("- Cache latency:    {:?}", avg_cache_latency);

    if avg_cache_latency.as_nanos() > 0 {
        let speedup = api_latency.as_secs_f64() / avg_cache_latency.as_secs_f64();
        println!("- Speedup: cache hits are approx. {:.0}x faster than the provider chain.", speedup);
    }

    let health = orchestrator.health_check();
    println!("- Health: {:?} ({})", health.status, health.message.unwrap_or_default());

    Ok(())
}

use clap::Parser;
use stress_test::{stress_test_counters, stress_test_scaling, StressConfig};
use tracing_subscriber::EnvFilter;
pub mod stress_test;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = StressConfig::parse();
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async_main(config))
}

async fn async_main(config: StressConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            COUNTER CONVERGENCE STRESS TESTS                ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let stats = stress_test_counters(&config).await?;
    stats.print();

    if let Some(max_replicas) = config.scale_to {
        stress_test_scaling(&config, max_replicas, 2).await?;
    }

    if !stats.converged {
        return Err(format!(
            "replicas diverged: expected {}, got {}",
            stats.expected_total, stats.final_total
        )
        .into());
    }

    println!("\n✓ All stress tests completed successfully!");
    Ok(())
}

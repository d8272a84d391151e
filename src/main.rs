use clap::Parser;
use market_sim::cli::{Cli, Commands};
use market_sim::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))
                .map_err(|e| anyhow::anyhow!("Invalid default config: {}", e))?
        }
    };

    // Initialize telemetry
    let _telemetry = market_sim::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Backtest(args) => {
            tracing::info!("Starting backtest");
            args.execute(&config).await?;
        }
        Commands::Generate(args) => {
            tracing::info!("Generating synthetic history");
            args.execute()?;
        }
        Commands::Config => {
            let sim = &config.simulation;
            println!("Current configuration:");
            println!("  Simulation: {} -> {} step {}", sim.start, sim.end, sim.step);
            println!(
                "  Backfill: {}",
                sim.backfill.map(|b| b.to_string()).unwrap_or_else(|| "none".into())
            );
            println!("  Spread: {:?}", sim.spread);
            println!("  Data: {:?}", config.data.dir);
            println!(
                "  Symbols: {}",
                config
                    .symbols
                    .iter()
                    .map(|s| s.code.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            for subscription in &config.subscriptions {
                println!(
                    "  Subscription: {};{}{}",
                    subscription.symbol,
                    subscription.timeframe,
                    if subscription.optional { " (optional)" } else { "" }
                );
            }
            for target in &config.aggregator.targets {
                println!(
                    "  Aggregator: {} {} -> {}",
                    target.symbol, config.aggregator.settings.source_timeframe, target.timeframe
                );
            }
        }
    }

    Ok(())
}

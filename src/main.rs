//! assistroute command-line entry point
//!
//! Loads the configuration, builds the backend registry and reports routing
//! decisions without invoking any backend.

use assistroute::cli::{self, Cli, Command};
use assistroute::config::Config;
use assistroute::models::{BackendId, LoadBalancer, ModelSelector, ProviderRegistry};
use assistroute::streaming::OutputFormat;
use assistroute::telemetry;
use clap::Parser;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Check);

    if let Command::Config { output } = &command {
        let template = cli::generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(path, template)?;
                eprintln!("Configuration template written to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    let config = Config::from_file(&cli.config)?;
    telemetry::init(&config.observability.log_level);

    let registry = Arc::new(ProviderRegistry::from_config(&config)?);
    tracing::info!(
        config_path = %cli.config,
        backends = registry.len(),
        strategy = %config.routing.strategy().as_str(),
        "Configuration loaded"
    );

    match command {
        Command::Config { .. } => {}
        Command::Check => print!("{}", cli::describe_registry(&registry)),
        Command::Route { ref format, .. } => {
            let constraints = command.constraints().unwrap_or_default();
            let selector = ModelSelector::with_strategy(registry, config.routing.strategy());
            let decision = selector.select_for(&constraints)?;
            let format: OutputFormat = format.parse()?;
            println!("{}", cli::render_decision(&decision, format)?);
        }
        Command::Fallbacks { current, count } => {
            let count = count.unwrap_or_else(|| config.routing.fallback_candidates());
            let balancer = LoadBalancer::new(registry);
            let candidates = balancer.get_fallback_providers(&BackendId::from(current), count);
            println!("{}", cli::render_candidates(&candidates, OutputFormat::Json)?);
        }
    }

    Ok(())
}

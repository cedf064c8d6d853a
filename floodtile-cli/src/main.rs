//! floodtile CLI
//!
//! Runs the tile redirect server and offers one-shot Earth Engine
//! diagnostics.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use floodtile_api::{ApiConfig, ApiServer};
use floodtile_core::constants::DEFAULT_PORT;
use floodtile_core::traits::MapResolver;
use floodtile_core::types::TileCoord;
use floodtile_earthengine::{EarthEngineResolver, FloodAlgorithm};

/// floodtile - cached Earth Engine flood-map tile proxy
#[derive(Parser)]
#[command(name = "floodtile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tile redirect server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: String,
    },

    /// Compute the flood map once and print its id
    Resolve,

    /// Compute the flood map once and print the URL of one tile
    TileUrl {
        /// Zoom level
        z: u32,
        /// Tile column
        x: u32,
        /// Tile row
        y: u32,
    },

    /// Print the Earth Engine expression without sending it
    Expression,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json);

    match cli.command {
        Commands::Serve { port, bind } => cmd_serve(port, &bind).await,
        Commands::Resolve => cmd_resolve().await,
        Commands::TileUrl { z, x, y } => cmd_tile_url(TileCoord::new(z, x, y)).await,
        Commands::Expression => cmd_expression(),
    }
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        "floodtile=debug,info"
    } else {
        "floodtile=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load_config() -> Result<ApiConfig> {
    ApiConfig::from_env().context("Invalid configuration")
}

fn build_resolver(config: &ApiConfig) -> Result<EarthEngineResolver> {
    EarthEngineResolver::with_config(config.resolver_config())
        .context("Failed to set up Earth Engine client")
}

/// Run the tile redirect server
async fn cmd_serve(port: u16, bind: &str) -> Result<()> {
    let config = load_config()?;

    println!("{}", "Starting floodtile server...".cyan().bold());
    println!("   {} http://{}:{}", "Listening on:".green(), bind, port);
    println!("   {} http://{}:{}/health", "Health check:".dimmed(), bind, port);
    println!("   {} {}", "Tiles from:".dimmed(), config.api_root);
    println!(
        "   {} {}s",
        "Cache max age:".dimmed(),
        config.cache_max_age.as_secs()
    );
    println!("\n   Press Ctrl+C to stop.\n");

    let server = ApiServer::new(config).context("Failed to build server")?;
    info!(%bind, port, "Server configured");

    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;
    server.run(addr).await?;

    Ok(())
}

/// Compute the flood map once
async fn cmd_resolve() -> Result<()> {
    let config = load_config()?;
    let resolver = build_resolver(&config)?;

    println!("{}", "Computing flood map on Earth Engine...".cyan().bold());
    let map = resolver.resolve().await.context("Map computation failed")?;
    info!(mapid = %map.mapid, "Resolved flood map");

    println!("   {} {}", "Map id:".green(), map.mapid);
    Ok(())
}

/// Compute the flood map once and print one tile URL
async fn cmd_tile_url(coord: TileCoord) -> Result<()> {
    let config = load_config()?;
    let resolver = build_resolver(&config)?;

    let map = resolver.resolve().await.context("Map computation failed")?;
    println!("{}", map.tile_url(resolver.api_root(), coord));
    Ok(())
}

/// Print the expression graph
fn cmd_expression() -> Result<()> {
    let algorithm = match ApiConfig::from_env() {
        Ok(config) => config.algorithm,
        Err(e) => {
            eprintln!("{} {}", "Using default parameters:".yellow(), e);
            FloodAlgorithm::default()
        }
    };
    algorithm.validate()?;

    let json = serde_json::to_string_pretty(&algorithm.expression())?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_tile_url() {
        let cli = Cli::try_parse_from(["floodtile", "tile-url", "3", "1", "2"]).unwrap();
        match cli.command {
            Commands::TileUrl { z, x, y } => assert_eq!(TileCoord::new(z, x, y), TileCoord::new(3, 1, 2)),
            _ => panic!("expected tile-url"),
        }
    }

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::try_parse_from(["floodtile", "-v", "serve", "--port", "9000", "--bind", "127.0.0.1"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Serve { port, bind } => {
                assert_eq!(port, 9000);
                assert_eq!(bind, "127.0.0.1");
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_tile_url_rejects_negative() {
        assert!(Cli::try_parse_from(["floodtile", "tile-url", "3", "-1", "2"]).is_err());
    }
}

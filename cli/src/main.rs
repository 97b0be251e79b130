// gattscope-cli — Desktop BLE inspector
//
// Cross-platform (macOS, Linux, Windows) command-line front end for the
// gattscope plugin, driven by a btleplug transport.

mod btle;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use gattscope_core::ble::names;
use gattscope_core::{BleEvent, BlePlugin, DiscoveredDevice, ServiceRecord};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "gattscope")]
#[command(about = "gattscope — BLE scanner and GATT inspector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for nearby devices
    Scan {
        /// Override the configured scan window
        #[arg(short, long)]
        window_ms: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Connect to a device and read every readable characteristic
    Connect {
        device_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Resolve a service or characteristic UUID to its assigned name
    Lookup { uuid: String },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { window_ms, json } => cmd_scan(window_ms, json).await,
        Commands::Connect { device_id, json } => cmd_connect(device_id, json).await,
        Commands::Lookup { uuid } => cmd_lookup(uuid),
        Commands::Config { action } => cmd_config(action),
    }
}

/// Build the plugin on a btleplug transport and pump its events
async fn start_plugin(config: &config::Config, window_ms: Option<u64>) -> Result<BlePlugin> {
    let mut plugin_config = config.plugin.clone();
    if let Some(window_ms) = window_ms {
        plugin_config.scan_window_ms = window_ms;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<BleEvent>();
    let transport = btle::BtleTransport::new(tx).await?;
    let plugin = BlePlugin::with_transport(Arc::new(transport), plugin_config)
        .context("Invalid plugin configuration")?;

    let pump = plugin.clone();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            pump.handle_event(event);
        }
    });

    Ok(plugin)
}

async fn scan_devices(plugin: &BlePlugin) -> Result<Vec<DiscoveredDevice>> {
    eprintln!(
        "{} Scanning for {} ms...",
        "●".blue(),
        plugin.config().scan_window_ms
    );
    let devices = plugin.scan().await.context("Scan failed")?;
    eprintln!("  {} {} device(s) found", "✓".green(), devices.len());
    Ok(devices)
}

async fn cmd_scan(window_ms: Option<u64>, json: bool) -> Result<()> {
    let config = config::Config::load()?;
    let json = json || config.json_output;
    let plugin = start_plugin(&config, window_ms).await?;

    let devices = scan_devices(&plugin).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    println!();
    for device in &devices {
        println!("  {}  {}", device.address.bright_cyan(), device.name);
    }
    Ok(())
}

async fn cmd_connect(device_id: String, json: bool) -> Result<()> {
    let config = config::Config::load()?;
    let json = json || config.json_output;
    let plugin = start_plugin(&config, None).await?;

    // The transport only resolves addresses it has sighted
    let devices = scan_devices(&plugin).await?;
    if !devices.iter().any(|d| d.address == device_id) {
        eprintln!("  {} {} was not seen in this scan", "⚠".yellow(), device_id);
    }

    eprintln!("{} Connecting to {}...", "●".blue(), device_id.bright_cyan());
    let services = plugin
        .inspect(&device_id)
        .await
        .with_context(|| format!("Failed to inspect {}", device_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&services)?);
    } else {
        print_services(&services);
    }
    Ok(())
}

fn print_services(services: &[ServiceRecord]) {
    println!();
    for service in services {
        println!("{} {}", service.display_name.bold(), service.uuid.dimmed());
        for characteristic in &service.characteristics {
            let value = match characteristic.failure_status {
                Some(status) => format!("(read failed, status {})", status).red().to_string(),
                None => hex::encode(&characteristic.value),
            };
            println!(
                "  {} {}  {}",
                characteristic.display_name,
                characteristic.uuid.dimmed(),
                value
            );
        }
    }
}

fn cmd_lookup(uuid: String) -> Result<()> {
    let number = names::assigned_number(&uuid)
        .with_context(|| format!("{} is not a Bluetooth SIG UUID", uuid))?;

    println!("{}", format!("0x{:04X}", number).bold());
    println!("  Service:        {}", names::service_name(&uuid));
    println!("  Characteristic: {}", names::characteristic_name(&uuid));
    Ok(())
}

fn cmd_config(action: ConfigAction) -> Result<()> {
    let mut config = config::Config::load()?;

    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("{} {} = {}", "✓".green(), key.bold(), value);
        }
        ConfigAction::Get { key } => match config.get(&key) {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("Unknown config key: {}", key),
        },
        ConfigAction::List => {
            println!("{}", "Configuration".bold());
            println!("  File: {}", config::Config::config_file()?.display());
            println!();
            for (key, value) in config.list() {
                println!("  {:<24} {}", key, value);
            }
        }
    }
    Ok(())
}

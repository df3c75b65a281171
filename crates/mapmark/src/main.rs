//! `mapmark` - CLI for the map-annotation marker store
//!
//! This binary manages the marker database used by the map-annotation app:
//! adding markers, listing what is stored, inspecting decode diagnostics,
//! and resetting the store.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Write;

use anyhow::Context;
use clap::Parser;

use mapmark::cli::{Cli, Command, ConfigCommand, OutputFormat};
use mapmark::store::{MarkerStore, SqliteStore};
use mapmark::{codec, init_logging, Config, Coordinate, Marker};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Add(cmd) => handle_add(&config, &cmd),
        Command::List(cmd) => handle_list(&config, &cmd),
        Command::Clear(cmd) => handle_clear(&config, &cmd),
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Config(cmd) => handle_config(&config, &cmd),
    }
}

fn open_store(config: &Config) -> anyhow::Result<MarkerStore<SqliteStore>> {
    let backend = SqliteStore::open(config.database_path())
        .with_context(|| format!("opening {}", config.database_path().display()))?;
    Ok(MarkerStore::open(backend))
}

fn handle_add(config: &Config, cmd: &mapmark::cli::AddCommand) -> anyhow::Result<()> {
    let coordinate = Coordinate::new(cmd.lat, cmd.long);
    anyhow::ensure!(
        coordinate.is_in_range(),
        "coordinate {coordinate} is outside WGS-84 range"
    );
    let color = codec::decode_color(&cmd.color)
        .with_context(|| format!("parsing color {:?}", cmd.color))?;
    anyhow::ensure!(!cmd.name.is_empty(), "marker name must not be empty");

    let mut store = open_store(config)?;
    store.add(Marker::new(cmd.name.clone(), coordinate, color));

    let report = store.save_report();
    if report.failed > 0 {
        println!(
            "Added \"{}\" at {coordinate} ({} record(s) failed to write, see logs)",
            cmd.name, report.failed
        );
    } else {
        println!(
            "Added \"{}\" at {coordinate} ({} marker(s) stored)",
            cmd.name,
            store.len()
        );
    }
    Ok(())
}

fn handle_list(config: &Config, cmd: &mapmark::cli::ListCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let markers = store.markers();

    match cmd.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(markers)?);
        }
        OutputFormat::Plain => {
            for marker in markers {
                println!("{}\t{}\t{}", marker.name, marker.coordinate, marker.color);
            }
        }
        OutputFormat::Table => {
            if markers.is_empty() {
                println!("No markers stored.");
            } else {
                println!("{:<4} {:<24} {:<24} {}", "#", "NAME", "COORDINATE", "COLOR");
                for (index, marker) in markers.iter().enumerate() {
                    println!(
                        "{index:<4} {:<24} {:<24} {}",
                        marker.name,
                        marker.coordinate.to_string(),
                        marker.color
                    );
                }
            }
        }
    }

    let report = store.load_report();
    if report.skipped > 0 {
        eprintln!("({} corrupt record(s) skipped)", report.skipped);
    }
    if report.length_corrupt {
        eprintln!("(marker count record is corrupt; stored markers were not loaded)");
    }
    Ok(())
}

fn handle_clear(config: &Config, cmd: &mapmark::cli::ClearCommand) -> anyhow::Result<()> {
    let mut store = open_store(config)?;

    if !cmd.yes {
        print!("Remove all {} stored marker(s)? [y/N] ", store.len());
        std::io::stdout().flush()?;

        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }

    store.clear();
    println!("Marker store cleared.");
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let report = store.load_report();

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "markers": store.len(),
            "expected": report.expected,
            "skipped": report.skipped,
            "length_corrupt": report.length_corrupt,
            "stored_keys": store.backend().key_count().unwrap_or(-1),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("mapmark status");
        println!("--------------");
        println!("Database:      {}", config.database_path().display());
        println!("Markers:       {}", store.len());
        if report.skipped > 0 {
            println!("Skipped:       {} corrupt record(s)", report.skipped);
        }
        if report.length_corrupt {
            println!("Warning:       marker count record is corrupt");
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("database_path = {}", config.database_path().display());
                println!("geocode.timeout_ms = {}", config.geocode.timeout_ms);
                println!("geocode.fallback_name = {:?}", config.geocode.fallback_name);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => match Config::load_from(file.clone()) {
            Ok(_) => println!("Configuration is valid."),
            Err(e) => {
                println!("Configuration is invalid: {e}");
                std::process::exit(1);
            }
        },
    }
    Ok(())
}

//! Point d'entrée CLI pour stride-locations

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use stride::CancellationToken;

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Récupérer les positions des véhicules Open Bus Stride en GeoJSON ou PostGIS
#[derive(Parser)]
#[command(name = "stride-locations")]
#[command(author, version)]
#[command(about = "Récupérer les positions SIRI des véhicules (Open Bus Stride) en points Israeli TM Grid")]
#[command(long_about = "Interroge l'API Open Bus Stride, convertit chaque position vers un schéma typé fixe, reprojette lon/lat vers EPSG:2039 et écrit le résultat en GeoJSON ou dans PostGIS.\n\nCtrl-C interrompt proprement l'écriture en conservant les features déjà écrites.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    // Ctrl-C : arrêt au prochain enregistrement, sortie partielle conservée
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        info!("Interruption requested");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    match &cli.command {
        Commands::ToGeojson { query, output } => cli::cmd_to_geojson(query, output, &cancel)?,
        Commands::ToPostgis { query, db } => cli::cmd_to_postgis(query, db, &cancel)?,
        Commands::Schema { schema } => cli::cmd_schema(schema.as_deref())?,
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}

//! Définition et implémentation des commandes CLI
//!
//! - `to-geojson` : positions → fichier GeoJSON
//! - `to-postgis` : positions → table PostGIS
//! - `schema` : affiche le schéma de sortie en JSON

use std::cell::Cell;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use tracing::{debug, info};

use stride::query::{DEFAULT_API_PATH, DEFAULT_EXTRA_PARAMS};
use stride::{CancellationToken, Crs, Extent, HttpFetcher, ProgressReporter, ReqwestTransport};

use stride_locations::export::pool::DatabaseConfig;
use stride_locations::export::{GeoJsonFileProvider, PostgisProvider, SinkProvider};
use stride_locations::pipeline::{run, RunRequest};
use stride_locations::reproject_lite::SmartProvider;
use stride_locations::{Config, RunStatus};

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch vehicle locations into a GeoJSON file
    ToGeojson {
        #[command(flatten)]
        query: QueryArgs,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Fetch vehicle locations into a PostGIS table
    ToPostgis {
        #[command(flatten)]
        query: QueryArgs,

        #[command(flatten)]
        db: DatabaseArgs,
    },

    /// Print the output schema as JSON
    Schema {
        /// Alternate schema file to validate and print
        #[arg(long)]
        schema: Option<PathBuf>,
    },
}

/// Filtres de la requête (communs aux sorties)
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// API endpoint path
    #[arg(long, default_value = DEFAULT_API_PATH)]
    pub api_path: String,

    /// Additional parameters as a mapping literal, e.g. "{'limit': 10, 'line_ref': 7}"
    #[arg(long, default_value = DEFAULT_EXTRA_PARAMS)]
    pub params: String,

    /// Filter extent "xmin,ymin,xmax,ymax [EPSG:n]" (default CRS: EPSG:4326)
    #[arg(long, value_parser = parse_extent)]
    pub extent: Option<Extent>,

    /// Start of the time window (ISO-8601, UTC when no offset is given)
    #[arg(long, value_parser = parse_start_time)]
    pub start_time: Option<DateTime<Utc>>,

    /// Length of the time window in minutes
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(i64).range(1..))]
    pub duration: i64,

    /// EPSG code of the output geometries
    #[arg(long, default_value_t = 2039)]
    pub dest_srid: u32,

    /// Alternate output schema (JSON file)
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Save the run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Connexion PostgreSQL (défauts : variables PG*)
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Target PostgreSQL schema
    #[arg(long, default_value = "stride")]
    pub pg_schema: String,

    /// Target table
    #[arg(long, default_value = "vehicle_locations")]
    pub table: String,

    /// Drop the table before writing
    #[arg(long)]
    pub drop_table: bool,

    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// PostgreSQL database name (défaut : env PGDATABASE / stride)
    #[arg(long)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long)]
    pub password: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long)]
    pub port: Option<u16>,

    /// SSL mode: disable, require (défaut : env PGSSLMODE / disable)
    #[arg(long)]
    pub ssl: Option<String>,
}

impl DatabaseArgs {
    /// Configuration issue de l'environnement, surchargée par les options
    fn database_config(&self) -> Result<DatabaseConfig> {
        let mut config = DatabaseConfig::from_env();
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(database) = &self.database {
            config.dbname = database.clone();
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ssl) = &self.ssl {
            config.ssl_mode = ssl.parse().map_err(anyhow::Error::msg)?;
        }
        Ok(config)
    }
}

fn parse_extent(s: &str) -> Result<Extent, String> {
    s.parse::<Extent>().map_err(|e| e.to_string())
}

fn parse_start_time(s: &str) -> Result<DateTime<Utc>, String> {
    stride::schema::parse_timestamp(s).ok_or_else(|| format!("invalid timestamp: {}", s))
}

/// Rapporteur d'avancement vers les logs (un palier tous les 10 %)
struct LogProgress {
    last: Cell<u8>,
}

impl LogProgress {
    fn new() -> Self {
        Self { last: Cell::new(0) }
    }
}

impl ProgressReporter for LogProgress {
    fn set_progress(&self, percent: u8) {
        if percent / 10 > self.last.get() / 10 || percent == 100 {
            self.last.set(percent);
            debug!(percent, "Progress");
        }
    }

    fn push_info(&self, message: &str) {
        info!("{}", message);
    }
}

/// Exécute la commande to-geojson
pub fn cmd_to_geojson(query: &QueryArgs, output: &Path, cancel: &CancellationToken) -> Result<()> {
    info!(output = %output.display(), "Export vers GeoJSON");
    let mut sink = GeoJsonFileProvider::new(output);
    run_query(query, &mut sink, cancel)
}

/// Exécute la commande to-postgis
pub fn cmd_to_postgis(
    query: &QueryArgs,
    db: &DatabaseArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let db_config = db.database_config()?;
    println!(
        "Database: {} (SSL: {:?})",
        db_config.describe(),
        db_config.ssl_mode
    );

    let mut sink = PostgisProvider::new(db_config, &db.pg_schema, &db.table, db.drop_table);
    run_query(query, &mut sink, cancel)
}

/// Exécute la commande schema
pub fn cmd_schema(schema: Option<&Path>) -> Result<()> {
    let config = Config::load(schema)?;
    println!("{}", config.schema_json()?);
    Ok(())
}

fn run_query(
    query: &QueryArgs,
    sink: &mut dyn SinkProvider,
    cancel: &CancellationToken,
) -> Result<()> {
    let config = Config::load(query.schema.as_deref())?;

    let request = RunRequest {
        base_url: config.fetch.base_url.clone(),
        api_path: query.api_path.clone(),
        extra_params: query.params.clone(),
        extent: query.extent,
        start_time: query.start_time,
        duration_minutes: query.duration,
        dest_crs: Crs::new(query.dest_srid),
        schema: config.schema,
    };

    let transport =
        ReqwestTransport::new(&config.fetch).context("Failed to create HTTP client")?;
    let fetcher = HttpFetcher::new(transport);

    let outcome = run(
        &request,
        &fetcher,
        &SmartProvider,
        sink,
        &LogProgress::new(),
        cancel,
    )?;
    let report = outcome.report;

    match report.status {
        RunStatus::NoData => println!("No data returned from API."),
        RunStatus::Cancelled => println!("Cancelled: partial output kept."),
        _ => {}
    }
    report.display();

    if let Some(path) = &query.report {
        report.save_to_file(path)?;
        info!(path = %path.display(), "Report saved");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_time() {
        let ts = parse_start_time("2024-05-01T10:00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert!(parse_start_time("yesterday").is_err());
    }

    #[test]
    fn test_parse_extent() {
        let extent = parse_extent("170000,650000,190000,670000 [EPSG:2039]").unwrap();
        assert_eq!(extent.crs, Crs::ISRAEL_GRID);
        assert!(parse_extent("1,2").is_err());
    }

    #[test]
    fn test_log_progress_steps() {
        let progress = LogProgress::new();
        progress.set_progress(5);
        assert_eq!(progress.last.get(), 0);
        progress.set_progress(23);
        assert_eq!(progress.last.get(), 23);
        progress.set_progress(100);
        assert_eq!(progress.last.get(), 100);
    }
}

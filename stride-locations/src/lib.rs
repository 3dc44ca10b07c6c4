//! # stride-locations
//!
//! Positions SIRI des véhicules (API Open Bus Stride) vers GeoJSON ou PostGIS,
//! en points Israeli TM Grid.
//!
//! ## Features
//!
//! - Reprojection pure Rust WGS84 / Israeli TM Grid / Web Mercator
//! - PROJ en option (feature `reproject`) pour les autres CRS
//! - Export GeoJSON en streaming ou table PostGIS avec pool de connexions
//! - Rapport d'exécution JSON
//! - Annulation par Ctrl-C
//!
//! ## Usage CLI
//!
//! ```bash
//! # 5 minutes de positions à partir d'une date, vers GeoJSON
//! stride-locations to-geojson --start-time 2024-05-01T08:00:00 --output ./locations.geojson
//!
//! # Emprise ITM et paramètres additionnels, vers PostGIS
//! stride-locations to-postgis --extent "175000,660000,185000,670000 [EPSG:2039]" \
//!     --params "{'limit': 5000, 'siri_routes__line_ref': 7}"
//! ```

pub mod config;
pub mod export;
pub mod pipeline;
pub mod report;
pub mod reproject_lite;

pub use config::Config;
pub use export::pool::{create_pool, DatabaseConfig};
pub use pipeline::{run, RunOutcome, RunRequest};
pub use report::{RunReport, RunStatus};

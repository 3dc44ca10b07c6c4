//! # stride
//!
//! Client pour l'API Open Bus Stride (positions SIRI des véhicules).
//!
//! ## Features
//!
//! - Construction de la requête (emprise, fenêtre temporelle, paramètres libres)
//! - Appel HTTP synchrone avec classification des erreurs
//! - Conversion des enregistrements JSON vers un schéma typé fixe
//! - Projection des positions lon/lat vers un CRS de destination
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stride::{FetchConfig, HttpFetcher, QueryBuilder, ReqwestTransport};
//!
//! let config = FetchConfig::from_env();
//! let query = QueryBuilder::new(&config.base_url, &provider)
//!     .build("/siri_vehicle_locations/list", "{'limit': 10}", None, None, 5)?;
//! let fetcher = HttpFetcher::new(ReqwestTransport::new(&config)?);
//! let outcome = fetcher.fetch(&query.url)?;
//! println!("{} records", outcome.len());
//! ```

pub mod error;
pub mod feedback;
pub mod fetch;
pub mod geometry;
pub mod query;
pub mod schema;
pub mod types;

pub use error::StrideError;
pub use feedback::{CancellationToken, NoProgress, ProgressReporter};
pub use fetch::{FetchConfig, FetchOutcome, HttpFetcher, HttpResponse, HttpTransport, ReqwestTransport};
pub use geometry::{
    CrsTransform, GeometryProjector, IdentityTransform, ProjectedPoint, TransformProvider,
};
pub use query::{BuiltQuery, ParamValue, QueryBuilder, QueryParameters};
pub use schema::{KeyMapping, Schema, SchemaMapper};
pub use types::{AttributeValue, Crs, Extent, FieldSpec, FieldType, OutputRecord, RawRecord};

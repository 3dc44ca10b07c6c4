//! Modules d'export (GeoJSON, PostgreSQL)

pub mod emitter;
pub mod geojson;
pub mod pool;
pub mod postgres;
#[cfg(feature = "reproject")]
pub mod reproject;
pub mod sink;

pub use emitter::{emit, EmitOutcome, EmitStats};
pub use geojson::GeoJsonFileProvider;
pub use postgres::PostgisProvider;
pub use sink::{FeatureSink, GeometryKind, MemoryProvider, SinkHandle, SinkProvider};

//! Tests d'intégration PostgreSQL
//!
//! Ces tests nécessitent une base PostGIS disponible.
//! Configuration via variables d'environnement:
//! - PGHOST, PGPORT, PGUSER, PGPASSWORD, PGDATABASE
//!
//! Exécution:
//! ```bash
//! # Avec Docker
//! docker run -d --name postgis-test -e POSTGRES_PASSWORD=test -p 5432:5432 postgis/postgis
//! PGPASSWORD=test PGDATABASE=postgres cargo test --test postgres_integration -- --ignored
//! ```

use anyhow::Result;
use geo::Point;

use stride::{AttributeValue, Crs, OutputRecord, Schema};
use stride_locations::export::{GeometryKind, PostgisProvider, SinkHandle, SinkProvider};
use stride_locations::{create_pool, DatabaseConfig};

const PG_SCHEMA: &str = "stride_test";

fn record(id: i64, geometry: Option<Point<f64>>) -> OutputRecord {
    let schema = Schema::vehicle_locations();
    let mut attributes = vec![AttributeValue::Null; schema.len()];
    attributes[0] = AttributeValue::Int(id);
    attributes[3] = AttributeValue::Text("2024-05-01T08:01:02.500Z".into());
    attributes[17] = AttributeValue::Text("7412345".into());
    OutputRecord {
        attributes,
        geometry,
    }
}

/// Interroge la table écrite (runtime dédié, hors de celui du sink)
fn query_table(table: &str) -> Result<(i64, i64, Option<i32>)> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let pool = create_pool(&DatabaseConfig::from_env())?;
        let client = pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "SELECT COUNT(*), COUNT(geometry), MAX(ST_SRID(geometry)) FROM {}.{}",
                    PG_SCHEMA, table
                ),
                &[],
            )
            .await?;
        Ok::<_, anyhow::Error>((row.get(0), row.get(1), row.get(2)))
    })
}

#[test]
#[ignore]
fn test_write_points() -> Result<()> {
    let mut provider =
        PostgisProvider::new(DatabaseConfig::from_env(), PG_SCHEMA, "locations", true);
    let mut sink = provider.open(
        &Schema::vehicle_locations(),
        GeometryKind::Point,
        Crs::ISRAEL_GRID,
    )?;

    sink.add_feature(&record(1, Some(Point::new(179_380.4, 664_158.9))))?;
    sink.add_feature(&record(2, None))?;

    // lon non numérique : ligne insérée avec lon à NULL
    let mut bad_lon = record(3, None);
    bad_lon.attributes[4] = AttributeValue::Text("east".into());
    sink.add_feature(&bad_lon)?;

    let handle = sink.finish()?;

    assert_eq!(
        handle,
        SinkHandle::Table {
            schema: PG_SCHEMA.into(),
            table: "locations".into()
        }
    );

    let (rows, with_geometry, srid) = query_table("locations")?;
    assert_eq!(rows, 3);
    assert_eq!(with_geometry, 1);
    assert_eq!(srid, Some(2039));
    Ok(())
}

#[test]
#[ignore]
fn test_append_without_drop() -> Result<()> {
    for _ in 0..2 {
        let mut provider =
            PostgisProvider::new(DatabaseConfig::from_env(), PG_SCHEMA, "appended", false);
        let mut sink = provider.open(
            &Schema::vehicle_locations(),
            GeometryKind::Point,
            Crs::ISRAEL_GRID,
        )?;
        sink.add_feature(&record(1, Some(Point::new(200_000.0, 600_000.0))))?;
        sink.finish()?;
    }

    let (rows, _, _) = query_table("appended")?;
    assert!(rows >= 2);
    Ok(())
}

#[test]
fn test_unreachable_database() {
    let db = DatabaseConfig {
        host: "127.0.0.1".into(),
        port: 1,
        ..DatabaseConfig::default()
    };
    let mut provider = PostgisProvider::new(db, PG_SCHEMA, "never", false);
    let result = provider.open(
        &Schema::vehicle_locations(),
        GeometryKind::Point,
        Crs::ISRAEL_GRID,
    );
    assert!(matches!(
        result,
        Err(stride::StrideError::SinkUnavailable(_))
    ));
}

//! Export vers PostgreSQL/PostGIS

use anyhow::{Context, Result};
use deadpool_postgres::Pool;
use geo::{Geometry, Point};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};
use wkb::geom_to_wkb;

use stride::{AttributeValue, Crs, FieldType, OutputRecord, Schema, StrideError};

use super::pool::{create_pool, test_connection, DatabaseConfig};
use super::sink::{FeatureSink, GeometryKind, SinkHandle, SinkProvider};

/// Configuration d'une table d'export
#[derive(Debug, Clone)]
pub struct TableConfig {
    pub schema: String,
    pub name: String,
    pub geometry_type: String,
    pub srid: u32,
    pub columns: Vec<ColumnConfig>,
}

/// Configuration d'une colonne
#[derive(Debug, Clone)]
pub struct ColumnConfig {
    pub name: String,
    pub kind: FieldType,
    pub pg_type: &'static str,
}

impl TableConfig {
    /// Table correspondant à un schéma de sortie
    pub fn from_schema(
        pg_schema: &str,
        table: &str,
        schema: &Schema,
        kind: GeometryKind,
        crs: Crs,
    ) -> Self {
        Self {
            schema: pg_schema.to_string(),
            name: table.to_string(),
            geometry_type: kind.as_str().to_string(),
            srid: crs.epsg,
            columns: schema
                .fields
                .iter()
                .map(|f| ColumnConfig {
                    name: f.name.clone(),
                    kind: f.kind,
                    pg_type: f.kind.pg_type(),
                })
                .collect(),
        }
    }

    fn qualified_name(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }

    /// DDL de création de la table
    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.pg_type))
            .collect();

        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                row_id BIGSERIAL PRIMARY KEY,
                {},
                geometry geometry({}, {}),
                created_at TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
            self.qualified_name(),
            columns.join(",\n                "),
            self.geometry_type,
            self.srid
        )
    }

    /// Valeurs d'une ligne, ramenées au type de chaque colonne
    ///
    /// Une valeur incompatible est insérée à NULL : un cast refusé par le
    /// serveur annulerait toute la transaction.
    pub fn row_values(&self, attributes: &[AttributeValue]) -> Vec<Option<String>> {
        self.columns
            .iter()
            .zip(attributes)
            .map(|(column, value)| {
                let text = value.to_column_text(column.kind);
                if text.is_none() && !value.is_null() {
                    warn!(
                        column = %column.name,
                        value = ?value,
                        "Value does not fit column type, inserted as NULL"
                    );
                }
                text
            })
            .collect()
    }

    /// Requête d'insertion : attributs passés en texte puis castés côté serveur
    pub fn insert_sql(&self) -> String {
        let column_list: Vec<String> = self.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let placeholders: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("${}::text::{}", i + 2, c.pg_type))
            .collect();

        format!(
            "INSERT INTO {} (geometry, {}) VALUES (ST_GeomFromEWKB($1::bytea), {})",
            self.qualified_name(),
            column_list.join(", "),
            placeholders.join(", ")
        )
    }
}

/// Fabrique de destinations PostGIS
pub struct PostgisProvider {
    db: DatabaseConfig,
    pg_schema: String,
    table: String,
    drop_existing: bool,
}

impl PostgisProvider {
    pub fn new(db: DatabaseConfig, pg_schema: &str, table: &str, drop_existing: bool) -> Self {
        Self {
            db,
            pg_schema: pg_schema.to_string(),
            table: table.to_string(),
            drop_existing,
        }
    }

    fn open_table(&self, config: TableConfig) -> Result<PostgisSink> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build tokio runtime")?;

        let pool = create_pool(&self.db)?;
        runtime.block_on(async {
            test_connection(&pool).await?;
            create_table(&pool, &config, self.drop_existing).await
        })?;

        info!(
            database = %self.db.describe(),
            table = %config.qualified_name(),
            srid = config.srid,
            "PostGIS output opened"
        );

        Ok(PostgisSink {
            runtime,
            pool,
            insert_sql: config.insert_sql(),
            config,
            rows: Vec::new(),
        })
    }
}

impl SinkProvider for PostgisProvider {
    fn open(
        &mut self,
        schema: &Schema,
        kind: GeometryKind,
        crs: Crs,
    ) -> Result<Box<dyn FeatureSink>, StrideError> {
        let config = TableConfig::from_schema(&self.pg_schema, &self.table, schema, kind, crs);
        let sink = self
            .open_table(config)
            .map_err(|e| StrideError::SinkUnavailable(format!("{:#}", e)))?;
        Ok(Box::new(sink))
    }
}

/// Ligne prête à insérer
struct PendingRow {
    geometry: Option<Vec<u8>>,
    values: Vec<Option<String>>,
}

/// Destination PostGIS : lignes accumulées puis insérées dans une transaction
pub struct PostgisSink {
    runtime: Runtime,
    pool: Pool,
    config: TableConfig,
    insert_sql: String,
    rows: Vec<PendingRow>,
}

impl PostgisSink {
    async fn flush(&self) -> Result<u64> {
        let mut client = self
            .pool
            .get()
            .await
            .context("Failed to get connection from pool")?;
        let transaction = client
            .transaction()
            .await
            .context("Failed to begin transaction")?;
        let stmt = transaction
            .prepare(&self.insert_sql)
            .await
            .context("Failed to prepare insert")?;

        let mut inserted = 0;
        for row in &self.rows {
            let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
                Vec::with_capacity(row.values.len() + 1);
            params.push(&row.geometry);
            for value in &row.values {
                params.push(value);
            }
            inserted += transaction
                .execute(&stmt, &params)
                .await
                .context("Failed to insert feature")?;
        }

        transaction
            .commit()
            .await
            .context("Failed to commit transaction")?;
        Ok(inserted)
    }
}

impl FeatureSink for PostgisSink {
    fn add_feature(&mut self, record: &OutputRecord) -> Result<(), StrideError> {
        let geometry = match record.geometry {
            Some(point) => match point_to_ewkb(point, self.config.srid) {
                Ok(ewkb) => Some(ewkb),
                Err(e) => {
                    warn!(error = %e, "Failed to convert geometry, inserted without geometry");
                    None
                }
            },
            None => None,
        };

        self.rows.push(PendingRow {
            geometry,
            values: self.config.row_values(&record.attributes),
        });
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<SinkHandle, StrideError> {
        let inserted = self
            .runtime
            .block_on(self.flush())
            .map_err(|e| StrideError::SinkUnavailable(format!("{:#}", e)))?;

        info!(
            table = %self.config.qualified_name(),
            rows = inserted,
            "PostGIS insert committed"
        );

        Ok(SinkHandle::Table {
            schema: self.config.schema.clone(),
            table: self.config.name.clone(),
        })
    }
}

/// Crée le schéma et la table
async fn create_table(pool: &Pool, config: &TableConfig, drop_existing: bool) -> Result<()> {
    let client = pool.get().await?;

    client
        .execute(
            &format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&config.schema)),
            &[],
        )
        .await
        .context("Failed to create schema")?;

    // Activer PostGIS si nécessaire (peut nécessiter des droits superuser).
    if let Err(e) = client
        .execute("CREATE EXTENSION IF NOT EXISTS postgis", &[])
        .await
    {
        warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
        let exists = client
            .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
            .await
            .context("Failed to check pg_extension")?
            .is_some();
        if !exists {
            return Err(anyhow::anyhow!(
                "PostGIS extension is not installed and could not be created: {e}"
            ));
        }
    }

    if drop_existing {
        client
            .execute(&format!("DROP TABLE IF EXISTS {}", config.qualified_name()), &[])
            .await
            .context("Failed to drop table")?;
    }

    client
        .execute(&config.create_sql(), &[])
        .await
        .with_context(|| format!("Failed to create table {}", config.qualified_name()))?;

    // Index spatial
    client
        .execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} USING GIST (geometry)",
                quote_ident(&format!("idx_{}_geom", config.name)),
                config.qualified_name()
            ),
            &[],
        )
        .await
        .with_context(|| format!("Failed to create geometry index on {}", config.qualified_name()))?;

    debug!(table = %config.qualified_name(), "Table ready");
    Ok(())
}

/// Convertit un point en EWKB PostGIS (WKB + SRID)
fn point_to_ewkb(point: Point<f64>, srid: u32) -> Result<Vec<u8>> {
    let wkb = geom_to_wkb(&Geometry::Point(point))
        .map_err(|e| anyhow::anyhow!("Failed to convert geometry to WKB: {:?}", e))?;

    if wkb.len() < 5 {
        anyhow::bail!("WKB too short ({} bytes)", wkb.len());
    }

    // Type avec flag SRID (0x20000000), dans l'ordre d'octets du WKB
    let little_endian = wkb[0] == 1;
    let type_bytes = [wkb[1], wkb[2], wkb[3], wkb[4]];
    let mut ewkb = Vec::with_capacity(wkb.len() + 4);
    ewkb.push(wkb[0]);
    if little_endian {
        let geom_type = u32::from_le_bytes(type_bytes) | 0x2000_0000;
        ewkb.extend_from_slice(&geom_type.to_le_bytes());
        ewkb.extend_from_slice(&srid.to_le_bytes());
    } else {
        let geom_type = u32::from_be_bytes(type_bytes) | 0x2000_0000;
        ewkb.extend_from_slice(&geom_type.to_be_bytes());
        ewkb.extend_from_slice(&srid.to_be_bytes());
    }
    ewkb.extend_from_slice(&wkb[5..]);

    Ok(ewkb)
}

/// Entoure un identifiant SQL de guillemets doubles
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

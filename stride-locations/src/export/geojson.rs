//! Export vers GeoJSON avec geozero (streaming)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use geo::Geometry;
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use tracing::debug;

use stride::{Crs, OutputRecord, Schema, StrideError};

use super::sink::{FeatureSink, GeometryKind, SinkHandle, SinkProvider};

/// Fabrique de fichiers GeoJSON (une FeatureCollection par ouverture)
#[derive(Debug, Clone)]
pub struct GeoJsonFileProvider {
    path: PathBuf,
}

impl GeoJsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SinkProvider for GeoJsonFileProvider {
    fn open(
        &mut self,
        schema: &Schema,
        _kind: GeometryKind,
        crs: Crs,
    ) -> Result<Box<dyn FeatureSink>, StrideError> {
        let sink = GeoJsonSink::create(&self.path, schema, crs)?;
        debug!(path = %self.path.display(), crs = %crs, "GeoJSON output opened");
        Ok(Box::new(sink))
    }
}

/// FeatureCollection écrite au fil de l'eau
pub struct GeoJsonSink<W: Write> {
    writer: W,
    path: PathBuf,
    field_names: Vec<String>,
    written: usize,
}

impl GeoJsonSink<BufWriter<File>> {
    /// Crée le fichier et écrit l'en-tête de la FeatureCollection
    pub fn create(path: &Path, schema: &Schema, crs: Crs) -> Result<Self, StrideError> {
        let file = File::create(path).map_err(|e| {
            StrideError::SinkUnavailable(format!("{}: {}", path.display(), e))
        })?;
        Self::with_writer(BufWriter::new(file), path, schema, crs)
    }
}

impl<W: Write> GeoJsonSink<W> {
    /// Écrit l'en-tête sur un writer quelconque
    pub fn with_writer(
        mut writer: W,
        path: &Path,
        schema: &Schema,
        crs: Crs,
    ) -> Result<Self, StrideError> {
        // Header FeatureCollection avec CRS
        write!(
            writer,
            r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"{}"}}}},"features":["#,
            crs.ogc_urn()
        )
        .map_err(|e| write_error(path, e))?;

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            field_names: schema.fields.iter().map(|f| f.name.clone()).collect(),
            written: 0,
        })
    }

    /// Nombre de features écrites
    pub fn written(&self) -> usize {
        self.written
    }

    /// Termine la collection et retourne le writer
    fn close(mut self) -> Result<(W, PathBuf), StrideError> {
        write!(self.writer, "]}}").map_err(|e| write_error(&self.path, e))?;
        self.writer.flush().map_err(|e| write_error(&self.path, e))?;
        Ok((self.writer, self.path))
    }
}

impl<W: Write> FeatureSink for GeoJsonSink<W> {
    fn add_feature(&mut self, record: &OutputRecord) -> Result<(), StrideError> {
        let mut buf = Vec::with_capacity(512);
        if self.written > 0 {
            buf.push(b',');
        }
        write_feature(&mut buf, &self.field_names, record)?;

        self.writer
            .write_all(&buf)
            .map_err(|e| write_error(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<SinkHandle, StrideError> {
        let written = self.written;
        let (_, path) = self.close()?;
        debug!(path = %path.display(), features = written, "GeoJSON output closed");
        Ok(SinkHandle::File(path))
    }
}

/// Écrit une feature en GeoJSON (propriétés dans l'ordre du schéma)
fn write_feature(
    buf: &mut Vec<u8>,
    field_names: &[String],
    record: &OutputRecord,
) -> Result<(), StrideError> {
    buf.extend_from_slice(br#"{"type":"Feature","geometry":"#);

    // Geometry via geozero
    match record.geometry {
        Some(point) => {
            let mut geom_writer = GeoJsonWriter::new(&mut *buf);
            Geometry::Point(point)
                .process_geom(&mut geom_writer)
                .map_err(|e| StrideError::SinkUnavailable(format!("GeoJSON geometry: {}", e)))?;
        }
        None => buf.extend_from_slice(b"null"),
    }

    // Properties
    buf.extend_from_slice(br#","properties":{"#);
    for (i, (name, value)) in field_names.iter().zip(&record.attributes).enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        serde_json::to_writer(&mut *buf, name).map_err(property_error)?;
        buf.push(b':');
        serde_json::to_writer(&mut *buf, &value.to_json()).map_err(property_error)?;
    }
    buf.extend_from_slice(b"}}");

    Ok(())
}

fn property_error(e: serde_json::Error) -> StrideError {
    StrideError::SinkUnavailable(format!("GeoJSON properties: {}", e))
}

fn write_error(path: &Path, e: std::io::Error) -> StrideError {
    StrideError::SinkUnavailable(format!("Failed to write {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use geo::Point;
    use stride::{AttributeValue, FieldSpec, FieldType};

    fn small_schema() -> Schema {
        Schema {
            fields: vec![
                FieldSpec::new("id", FieldType::Int64),
                FieldSpec::new("recorded_at_time", FieldType::Timestamp),
                FieldSpec::new("line_ref", FieldType::String),
            ],
            key_map: Vec::new(),
        }
    }

    #[test]
    fn test_write_feature() {
        let record = OutputRecord {
            attributes: vec![
                AttributeValue::Int(42),
                AttributeValue::Timestamp(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()),
                AttributeValue::Text("say \"hi\"".into()),
            ],
            geometry: Some(Point::new(1.0, 2.0)),
        };
        let names: Vec<String> = small_schema().fields.into_iter().map(|f| f.name).collect();

        let mut buf = Vec::new();
        write_feature(&mut buf, &names, &record).unwrap();
        let json = String::from_utf8(buf).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "Feature");
        assert_eq!(value["geometry"]["type"], "Point");
        assert_eq!(value["geometry"]["coordinates"][0], 1.0);
        assert_eq!(value["properties"]["id"], 42);
        assert_eq!(value["properties"]["recorded_at_time"], "2024-03-01T08:00:00.000Z");
        assert_eq!(value["properties"]["line_ref"], "say \"hi\"");

        // Ordre du schéma conservé
        let id_pos = json.find("\"id\"").unwrap();
        let line_pos = json.find("\"line_ref\"").unwrap();
        assert!(id_pos < line_pos);
    }

    #[test]
    fn test_null_geometry() {
        let record = OutputRecord {
            attributes: vec![AttributeValue::Null; 3],
            geometry: None,
        };
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut buf = Vec::new();
        write_feature(&mut buf, &names, &record).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert!(value["geometry"].is_null());
        assert!(value["properties"]["b"].is_null());
    }

    #[test]
    fn test_collection_in_memory() {
        let schema = small_schema();
        let path = Path::new("memory.geojson");
        let mut sink =
            GeoJsonSink::with_writer(Vec::new(), path, &schema, Crs::ISRAEL_GRID).unwrap();
        for id in 0..2 {
            sink.add_feature(&OutputRecord {
                attributes: vec![
                    AttributeValue::Int(id),
                    AttributeValue::Null,
                    AttributeValue::Null,
                ],
                geometry: Some(Point::new(179_380.0, 664_159.0)),
            })
            .unwrap();
        }
        assert_eq!(sink.written(), 2);

        let (bytes, _) = sink.close().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::2039");
        assert_eq!(value["features"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_collection_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.geojson");

        let mut provider = GeoJsonFileProvider::new(&path);
        let sink = provider
            .open(&small_schema(), GeometryKind::Point, Crs::WGS84)
            .unwrap();
        assert_eq!(sink.finish().unwrap(), SinkHandle::File(path.clone()));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("EPSG::4326"));
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert!(value["features"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.geojson");

        let mut provider = GeoJsonFileProvider::new(path);
        let err = provider
            .open(&small_schema(), GeometryKind::Point, Crs::WGS84)
            .err()
            .unwrap();
        assert!(matches!(err, StrideError::SinkUnavailable(_)));
    }
}

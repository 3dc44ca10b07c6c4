//! Schéma de sortie fixe et conversion des enregistrements bruts
//!
//! L'API renvoie des enregistrements plats dont les noms de champs ne
//! correspondent pas toujours aux colonnes de sortie : la table de
//! renommage ne couvre que les champs qui diffèrent, les autres sont lus
//! sous leur propre nom.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::types::{AttributeValue, FieldSpec, FieldType, RawRecord};
use crate::StrideError;

/// Colonnes de sortie des positions de véhicules, dans l'ordre
static VEHICLE_LOCATION_FIELDS: &[(&str, FieldType)] = &[
    ("id", FieldType::Int64),
    ("snapshot_id", FieldType::Int64),
    ("ride_stop_id", FieldType::Int64),
    ("recorded_at", FieldType::Timestamp),
    ("lon", FieldType::Double),
    ("lat", FieldType::Double),
    ("bearing", FieldType::Int32),
    ("velocity", FieldType::Int32),
    ("dist_from_start", FieldType::Int32),
    ("dist_from_stop", FieldType::Double),
    ("snapshot_str", FieldType::String),
    ("route_id", FieldType::Int32),
    ("line_ref", FieldType::Int32),
    ("operator_ref", FieldType::Int32),
    ("ride_id", FieldType::Int64),
    ("journey_ref", FieldType::String),
    ("scheduled_start", FieldType::Timestamp),
    ("vehicle_ref", FieldType::String),
];

/// Champ amont → colonne de sortie, uniquement quand les noms diffèrent
static VEHICLE_LOCATION_KEY_MAP: &[(&str, &str)] = &[
    ("siri_snapshot_id", "snapshot_id"),
    ("siri_ride_stop_id", "ride_stop_id"),
    ("recorded_at_time", "recorded_at"),
    ("distance_from_journey_start", "dist_from_start"),
    ("distance_from_siri_ride_stop_meters", "dist_from_stop"),
    ("siri_snapshot__snapshot_id", "snapshot_str"),
    ("siri_route__id", "route_id"),
    ("siri_route__line_ref", "line_ref"),
    ("siri_route__operator_ref", "operator_ref"),
    ("siri_ride__id", "ride_id"),
    ("siri_ride__journey_ref", "journey_ref"),
    ("siri_ride__scheduled_start_time", "scheduled_start"),
    ("siri_ride__vehicle_ref", "vehicle_ref"),
];

/// Renommage d'un champ amont vers une colonne de sortie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMapping {
    /// Nom du champ dans la réponse de l'API
    pub source: String,

    /// Nom de la colonne de sortie
    pub target: String,
}

/// Schéma de sortie : colonnes typées + table de renommage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<FieldSpec>,

    #[serde(default)]
    pub key_map: Vec<KeyMapping>,
}

impl Schema {
    /// Schéma des positions de véhicules SIRI (18 colonnes)
    pub fn vehicle_locations() -> Self {
        Self {
            fields: VEHICLE_LOCATION_FIELDS
                .iter()
                .map(|&(name, kind)| FieldSpec::new(name, kind))
                .collect(),
            key_map: VEHICLE_LOCATION_KEY_MAP
                .iter()
                .map(|&(source, target)| KeyMapping {
                    source: source.to_string(),
                    target: target.to_string(),
                })
                .collect(),
        }
    }

    /// Charge un schéma alternatif depuis un fichier JSON
    pub fn load(path: &Path) -> Result<Self, StrideError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StrideError::Config(format!("Failed to read schema {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse et valide un schéma JSON
    pub fn from_json(json: &str) -> Result<Self, StrideError> {
        let schema: Schema = serde_json::from_str(json)
            .map_err(|e| StrideError::Config(format!("Failed to parse schema JSON: {}", e)))?;
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<(), StrideError> {
        if self.fields.is_empty() {
            return Err(StrideError::Config("Schema has no fields".into()));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(StrideError::Config(format!("Field #{} has an empty name", i)));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(StrideError::Config(format!(
                    "Duplicate field name: {}",
                    field.name
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Nom du champ amont à lire pour une colonne de sortie
    pub fn source_key<'a>(&'a self, output_name: &'a str) -> &'a str {
        self.key_map
            .iter()
            .find(|m| m.target == output_name)
            .map(|m| m.source.as_str())
            .unwrap_or(output_name)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::vehicle_locations()
    }
}

/// Convertit les enregistrements bruts en attributs alignés sur le schéma
pub struct SchemaMapper {
    schema: Schema,
    /// Clé amont pré-calculée pour chaque colonne
    lookup: Vec<String>,
}

impl SchemaMapper {
    pub fn new(schema: Schema) -> Self {
        let lookup = schema
            .fields
            .iter()
            .map(|f| schema.source_key(&f.name).to_string())
            .collect();
        Self { schema, lookup }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Attributs typés dans l'ordre des colonnes (jamais d'échec)
    pub fn map(&self, record: &RawRecord) -> Vec<AttributeValue> {
        self.schema
            .fields
            .iter()
            .zip(&self.lookup)
            .map(|(field, key)| match record.get(key) {
                None | Some(Value::Null) => AttributeValue::Null,
                Some(value) => convert(value, field),
            })
            .collect()
    }
}

fn convert(value: &Value, field: &FieldSpec) -> AttributeValue {
    if field.kind == FieldType::Timestamp {
        return match value.as_str().and_then(parse_timestamp) {
            Some(ts) => AttributeValue::Timestamp(ts),
            None => {
                warn!(field = %field.name, value = %value, "Unparsable timestamp, stored as null");
                AttributeValue::Null
            }
        };
    }

    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => n
                .as_f64()
                .map(AttributeValue::Double)
                .unwrap_or(AttributeValue::Null),
        },
        Value::String(s) => AttributeValue::Text(s.clone()),
        nested => AttributeValue::Text(nested.to_string()),
    }
}

/// Parse une date ISO-8601 : RFC 3339, date-heure sans fuseau (UTC) ou date seule
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

//! Types de données pour le crate stride

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use geo::{Point, Rect};
use serde::{Deserialize, Serialize};

use crate::StrideError;

/// Enregistrement brut tel que renvoyé par l'API (un élément du tableau JSON)
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Système de référence de coordonnées identifié par son code EPSG
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
}

impl Crs {
    /// WGS84 géographique (lon/lat en degrés)
    pub const WGS84: Crs = Crs { epsg: 4326 };

    /// Israel Transverse Mercator (Israeli TM Grid)
    pub const ISRAEL_GRID: Crs = Crs { epsg: 2039 };

    /// Web Mercator (Pseudo-Mercator)
    pub const WEB_MERCATOR: Crs = Crs { epsg: 3857 };

    pub const fn new(epsg: u32) -> Self {
        Self { epsg }
    }

    /// Nom OGC utilisé dans l'en-tête `crs` des fichiers GeoJSON
    pub fn ogc_urn(&self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.epsg)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = StrideError;

    /// Accepte `EPSG:2039`, `epsg:2039` ou `2039`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code = match trimmed.get(..5) {
            Some(prefix) if prefix.eq_ignore_ascii_case("EPSG:") => &trimmed[5..],
            _ => trimmed,
        };
        code.trim()
            .parse::<u32>()
            .map(Crs::new)
            .map_err(|_| StrideError::Config(format!("Invalid CRS: {}", s)))
    }
}

/// Emprise rectangulaire associée à son CRS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub rect: Rect<f64>,
    pub crs: Crs,
}

impl Extent {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64, crs: Crs) -> Self {
        Self {
            rect: Rect::new((xmin, ymin), (xmax, ymax)),
            crs,
        }
    }
}

impl FromStr for Extent {
    type Err = StrideError;

    /// Format : `xmin,ymin,xmax,ymax` suivi optionnellement de ` [EPSG:n]`.
    /// Sans CRS explicite, l'emprise est en WGS84.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StrideError::Config(format!("Invalid extent: {}", s));

        let (coords, crs) = match s.find('[') {
            Some(pos) => {
                let crs_part = s[pos + 1..].trim().strip_suffix(']').ok_or_else(invalid)?;
                (&s[..pos], crs_part.parse::<Crs>()?)
            }
            None => (s, Crs::WGS84),
        };

        let values: Vec<f64> = coords
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid())?;

        match values.as_slice() {
            [xmin, ymin, xmax, ymax] if values.iter().all(|v| v.is_finite()) => {
                Ok(Extent::new(*xmin, *ymin, *xmax, *ymax, crs))
            }
            _ => Err(invalid()),
        }
    }
}

/// Type sémantique d'une colonne de sortie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int64,
    Double,
    Int32,
    String,
    Timestamp,
}

impl FieldType {
    /// Type PostgreSQL correspondant
    pub fn pg_type(&self) -> &'static str {
        match self {
            FieldType::Int64 => "BIGINT",
            FieldType::Double => "DOUBLE PRECISION",
            FieldType::Int32 => "INTEGER",
            FieldType::String => "TEXT",
            FieldType::Timestamp => "TIMESTAMPTZ",
        }
    }
}

/// Définition d'une colonne de sortie (nom, type)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Valeur d'attribut typée
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Valeur absente (null typé par la colonne)
    Null,
    Int(i64),
    Double(f64),
    Bool(bool),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Représentation JSON (les timestamps en ISO-8601 millisecondes)
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttributeValue::Null => serde_json::Value::Null,
            AttributeValue::Int(v) => serde_json::Value::from(*v),
            AttributeValue::Double(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            AttributeValue::Bool(v) => serde_json::Value::Bool(*v),
            AttributeValue::Text(v) => serde_json::Value::String(v.clone()),
            AttributeValue::Timestamp(v) => {
                serde_json::Value::String(v.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }

    /// Représentation texte compatible avec le type de la colonne
    ///
    /// `None` pour null ou pour une valeur qui ne rentre pas dans la colonne
    /// (texte non numérique dans une colonne numérique, décimal dans une
    /// colonne entière, ...).
    pub fn to_column_text(&self, kind: FieldType) -> Option<String> {
        match (kind, self) {
            (_, AttributeValue::Null) => None,
            (FieldType::String, AttributeValue::Text(v)) => Some(v.clone()),
            (FieldType::String, AttributeValue::Int(v)) => Some(v.to_string()),
            (FieldType::String, AttributeValue::Double(v)) => Some(v.to_string()),
            (FieldType::String, AttributeValue::Bool(v)) => Some(v.to_string()),
            (FieldType::String | FieldType::Timestamp, AttributeValue::Timestamp(v)) => {
                Some(v.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            (FieldType::Timestamp, AttributeValue::Text(v)) => crate::schema::parse_timestamp(v)
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            (FieldType::Timestamp, _) => None,
            (FieldType::Int64, v) => v.as_integer().map(|i| i.to_string()),
            (FieldType::Int32, v) => v
                .as_integer()
                .filter(|i| i32::try_from(*i).is_ok())
                .map(|i| i.to_string()),
            (FieldType::Double, v) => v.as_double().map(|d| d.to_string()),
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            AttributeValue::Double(v)
                if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 =>
            {
                Some(*v as i64)
            }
            AttributeValue::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_double(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Double(v) if v.is_finite() => Some(*v),
            AttributeValue::Text(v) => v.trim().parse::<f64>().ok().filter(|d| d.is_finite()),
            _ => None,
        }
    }
}

/// Enregistrement de sortie : attributs dans l'ordre du schéma + point optionnel
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub attributes: Vec<AttributeValue>,

    /// Point dans le CRS de destination (absent si lon/lat manquants ou invalides)
    pub geometry: Option<Point<f64>>,
}

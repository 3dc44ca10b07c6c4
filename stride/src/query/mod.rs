//! Construction de la requête (paramètres + URL)
//!
//! Aucun accès réseau : la seule erreur possible vient du littéral des
//! paramètres additionnels (ou de la reprojection de l'emprise).

pub mod literal;

use std::fmt;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;

use crate::geometry::{extent_to_wgs84, TransformProvider};
use crate::types::Extent;
use crate::StrideError;

/// Hôte de l'API Open Bus Stride
pub const DEFAULT_BASE_URL: &str = "https://open-bus-stride-api.hasadna.org.il";

/// Chemin par défaut (positions SIRI des véhicules)
pub const DEFAULT_API_PATH: &str = "/siri_vehicle_locations/list";

/// Paramètres additionnels par défaut
pub const DEFAULT_EXTRA_PARAMS: &str = "{'limit': 1000}";

/// Durée par défaut de la fenêtre temporelle (minutes)
pub const DEFAULT_DURATION_MINUTES: i64 = 5;

/// Valeur scalaire d'un paramètre de requête
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            // Forme littérale des paramètres additionnels
            ParamValue::Bool(true) => f.write_str("True"),
            ParamValue::Bool(false) => f.write_str("False"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

/// Paramètres de requête ordonnés
///
/// Une clé déjà présente est remplacée sur place (dernier écrit gagnant,
/// position d'origine conservée), comme un dictionnaire ordonné.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParameters {
    entries: Vec<(String, ParamValue)>,
}

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, ParamValue)> {
        self.entries.iter()
    }

    /// Chaîne de requête encodée (`:` laissé tel quel pour les horodatages)
    pub fn to_query_string(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(&v.to_string())))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Caractères laissés tels quels dans la requête (`:` gardé pour les horodatages)
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b':');

/// Encode un composant de requête (formulaire : espace → `+`)
fn encode_component(s: &str) -> String {
    s.split(' ')
        .map(|part| utf8_percent_encode(part, QUERY_COMPONENT).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// Formate un horodatage comme attendu par l'API (`yyyy-MM-ddTHH:mm:ss.sssZ`)
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Requête construite
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    /// URL complète à interroger
    pub url: String,

    /// Paramètres finaux (après fusion)
    pub params: QueryParameters,

    /// Messages informatifs à remonter à l'utilisateur
    pub messages: Vec<String>,
}

/// Construit la requête à partir des filtres utilisateur
pub struct QueryBuilder<'a> {
    base_url: String,
    provider: &'a dyn TransformProvider,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(base_url: impl Into<String>, provider: &'a dyn TransformProvider) -> Self {
        Self {
            base_url: base_url.into(),
            provider,
        }
    }

    /// Fusionne paramètres additionnels, emprise et fenêtre temporelle puis
    /// produit l'URL finale.
    pub fn build(
        &self,
        api_path: &str,
        extra_params_text: &str,
        extent: Option<&Extent>,
        start_time: Option<DateTime<Utc>>,
        duration_minutes: i64,
    ) -> Result<BuiltQuery, StrideError> {
        let mut params = literal::parse(extra_params_text)?;
        let mut messages = Vec::new();

        if let Some(extent) = extent {
            let bbox = extent_to_wgs84(self.provider, extent)?;
            params.insert("lon__greater_or_equal", bbox.min().x);
            params.insert("lon__lower_or_equal", bbox.max().x);
            params.insert("lat__greater_or_equal", bbox.min().y);
            params.insert("lat__lower_or_equal", bbox.max().y);
            debug!(crs = %extent.crs, ?bbox, "Extent filter reprojected to WGS84");
        }

        if let Some(start) = start_time {
            let from = format_timestamp(&start);
            messages.push(format!("Filtering from start time: {}", from));
            params.insert("recorded_at_time_from", from);

            if duration_minutes > 0 {
                let end = start + Duration::seconds(duration_minutes.saturating_mul(60));
                let to = format_timestamp(&end);
                messages.push(format!("Calculated end time: {}", to));
                params.insert("recorded_at_time_to", to);
            }
        }

        let mut url = format!("{}{}", self.base_url.trim_end_matches('/'), api_path);
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.to_query_string());
        }

        Ok(BuiltQuery {
            url,
            params,
            messages,
        })
    }
}

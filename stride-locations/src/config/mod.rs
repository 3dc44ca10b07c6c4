//! Configuration du système

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use stride::{FetchConfig, Schema};

/// Configuration principale
#[derive(Debug, Clone)]
pub struct Config {
    /// Client HTTP (URL de base, timeout, user-agent)
    pub fetch: FetchConfig,

    /// Schéma de sortie (colonnes + renommages)
    pub schema: Schema,
}

impl Config {
    /// Charge la configuration : variables d'environnement + schéma optionnel
    ///
    /// Sans fichier de schéma, le schéma intégré des positions de véhicules
    /// est utilisé.
    pub fn load(schema_path: Option<&Path>) -> Result<Self> {
        let schema = match schema_path {
            Some(path) => Schema::load(path)
                .with_context(|| format!("Failed to load schema: {}", path.display()))?,
            None => Schema::vehicle_locations(),
        };
        let fetch = FetchConfig::from_env();

        debug!(
            base_url = %fetch.base_url,
            timeout_secs = fetch.timeout.as_secs(),
            fields = schema.len(),
            "Configuration loaded"
        );

        Ok(Self { fetch, schema })
    }

    /// Schéma sérialisé en JSON (point de départ d'un schéma alternatif)
    pub fn schema_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.schema).context("Failed to serialize schema")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_schema() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.schema.len(), 18);

        let json = config.schema_json().unwrap();
        assert!(json.contains("\"recorded_at_time\""));
        assert!(json.contains("\"timestamp\""));
    }

    #[test]
    fn test_schema_file_roundtrip() {
        let config = Config::load(None).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.schema_json().unwrap().as_bytes())
            .unwrap();

        let reloaded = Config::load(Some(file.path())).unwrap();
        assert_eq!(reloaded.schema, config.schema);
    }

    #[test]
    fn test_invalid_schema_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"fields": []}"#).unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load schema"));
    }
}

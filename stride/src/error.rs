//! Types d'erreurs pour le crate stride

use thiserror::Error;

/// Erreurs terminales d'un appel à l'API Stride
///
/// Aucune n'est retentée : chacune interrompt l'opération en cours.
#[derive(Debug, Error)]
pub enum StrideError {
    /// Paramètres additionnels mal formés (littéral de mapping invalide)
    #[error("Invalid format for parameters: {0}")]
    InvalidParameterFormat(String),

    /// Erreur de transport (DNS, connexion, TLS, timeout)
    #[error("Network request failed: {0}")]
    Network(String),

    /// Réponse HTTP différente de 200
    #[error("API request failed with HTTP status code {0}")]
    HttpStatus(u16),

    /// Corps de réponse qui n'est pas du JSON valide
    #[error("Failed to parse JSON response: {0}")]
    ResponseParse(String),

    /// Destination de sortie impossible à ouvrir
    #[error("Invalid output specified: {0}")]
    SinkUnavailable(String),

    /// Transformation de coordonnées impossible à construire ou à appliquer
    #[error("Reprojection EPSG:{source_epsg} -> EPSG:{target_epsg} failed: {reason}")]
    Reprojection {
        source_epsg: u32,
        target_epsg: u32,
        reason: String,
    },

    /// Configuration invalide (schéma, CRS, étendue)
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StrideError {
    /// Crée une erreur de reprojection avec contexte
    pub fn reprojection(source_epsg: u32, target_epsg: u32, reason: impl Into<String>) -> Self {
        Self::Reprojection {
            source_epsg,
            target_epsg,
            reason: reason.into(),
        }
    }

    /// Code HTTP porté par l'erreur, le cas échéant
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus(code) => Some(*code),
            _ => None,
        }
    }
}

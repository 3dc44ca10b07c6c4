//! Reprojection intelligente : reproject_lite en priorité, fallback sur proj
//!
//! Utilise automatiquement la meilleure option disponible.

use super::ReprojectorLite;
use stride::{Crs, CrsTransform, StrideError, TransformProvider};

/// Reprojection intelligente
///
/// Essaie d'abord reproject_lite (pure Rust), puis fallback sur proj si disponible.
pub enum SmartReprojector {
    /// Reprojection légère (pure Rust)
    Lite(ReprojectorLite),
    /// Reprojection via PROJ (si feature activée)
    #[cfg(feature = "reproject")]
    Proj(crate::export::reproject::Reprojector),
    /// Pas de reprojection (source == cible)
    Identity(Crs),
}

impl SmartReprojector {
    /// Crée un nouveau reprojector
    pub fn new(source: Crs, target: Crs) -> Result<Self, StrideError> {
        // Pas de reprojection nécessaire
        if source == target {
            return Ok(Self::Identity(source));
        }

        // Essayer reproject_lite d'abord
        if ReprojectorLite::is_supported(source, target) {
            let lite = ReprojectorLite::new(source, target)?;
            return Ok(Self::Lite(lite));
        }

        // Fallback sur proj si disponible
        #[cfg(feature = "reproject")]
        {
            let proj = crate::export::reproject::Reprojector::new(source, target)?;
            return Ok(Self::Proj(proj));
        }

        // Aucune option disponible
        #[cfg(not(feature = "reproject"))]
        return Err(StrideError::reprojection(
            source.epsg,
            target.epsg,
            "supported without PROJ: 4326 (WGS84), 2039 (Israeli TM Grid), 3857 (Web Mercator); \
             build with `--features reproject` for other systems",
        ));
    }

    /// Retourne une description du reprojector utilisé
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identity(_) => "identity (pas de reprojection)",
            Self::Lite(_) => "reproject_lite (pure Rust)",
            #[cfg(feature = "reproject")]
            Self::Proj(_) => "proj (PROJ library)",
        }
    }
}

impl CrsTransform for SmartReprojector {
    fn source(&self) -> Crs {
        match self {
            Self::Identity(crs) => *crs,
            Self::Lite(lite) => lite.source(),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.source(),
        }
    }

    fn target(&self) -> Crs {
        match self {
            Self::Identity(crs) => *crs,
            Self::Lite(lite) => lite.target(),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.target(),
        }
    }

    fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64), StrideError> {
        match self {
            Self::Identity(_) => Ok((x, y)),
            Self::Lite(lite) => lite.transform_point(x, y),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.transform_point(x, y),
        }
    }
}

/// Fournisseur de transformations basé sur [`SmartReprojector`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartProvider;

impl TransformProvider for SmartProvider {
    fn transform(&self, from: Crs, to: Crs) -> Result<Box<dyn CrsTransform>, StrideError> {
        let reprojector = SmartReprojector::new(from, to)?;
        tracing::debug!(
            from = %from,
            to = %to,
            backend = reprojector.description(),
            "Reprojection configured"
        );
        Ok(Box::new(reprojector))
    }
}

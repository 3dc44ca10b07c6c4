//! Reprojection de points avec PROJ
//!
//! Ce module est disponible uniquement avec le feature `reproject`.

use proj::Proj;
use stride::{Crs, CrsTransform, StrideError};

/// Reprojection entre deux systèmes de coordonnées via la bibliothèque PROJ
pub struct Reprojector {
    proj: Proj,
    source: Crs,
    target: Crs,
}

impl Reprojector {
    /// Crée un nouveau reprojector entre deux EPSG
    pub fn new(source: Crs, target: Crs) -> Result<Self, StrideError> {
        // `new_known_crs` normalise l'ordre des axes (lon, lat) pour les CRS géographiques
        let proj = Proj::new_known_crs(&source.to_string(), &target.to_string(), None)
            .map_err(|e| StrideError::reprojection(source.epsg, target.epsg, e.to_string()))?;

        Ok(Self {
            proj,
            source,
            target,
        })
    }
}

impl CrsTransform for Reprojector {
    fn source(&self) -> Crs {
        self.source
    }

    fn target(&self) -> Crs {
        self.target
    }

    fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64), StrideError> {
        if self.source == self.target {
            return Ok((x, y));
        }
        self.proj.convert((x, y)).map_err(|e| {
            StrideError::reprojection(
                self.source.epsg,
                self.target.epsg,
                format!("coordinate transformation failed: {}", e),
            )
        })
    }
}

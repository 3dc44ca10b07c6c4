//! Reprojection légère en Rust pur (sans dépendances externes)
//!
//! Supporte les systèmes utiles pour les positions de véhicules en Israël :
//! - WGS84 (EPSG:4326) - coordonnées renvoyées par l'API
//! - Israeli TM Grid (EPSG:2039) - sortie par défaut
//! - Web Mercator (EPSG:3857) - emprises saisies sur fond de carte web
//!
//! Toute paire parmi ces trois systèmes est supportée, dans les deux sens.

mod ellipsoid;
mod helmert;
mod mercator;
mod smart;
mod tmerc;

pub use smart::{SmartProvider, SmartReprojector};

use stride::{Crs, CrsTransform, StrideError};

use helmert::ISRAEL_1993;
use tmerc::TransverseMercator;

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Reprojection légère entre WGS84, Israeli TM Grid et Web Mercator
pub struct ReprojectorLite {
    source: Crs,
    target: Crs,
}

impl ReprojectorLite {
    /// Crée un nouveau reprojector
    pub fn new(source: Crs, target: Crs) -> Result<Self, StrideError> {
        if !Self::is_supported(source, target) {
            return Err(StrideError::reprojection(
                source.epsg,
                target.epsg,
                "not supported by the built-in reprojection (supported: 4326, 2039, 3857)",
            ));
        }
        Ok(Self { source, target })
    }

    /// Vérifie si l'EPSG est supporté
    pub fn is_supported_epsg(epsg: u32) -> bool {
        matches!(epsg, 4326 | 2039 | 3857)
    }

    /// Vérifie si la reprojection est supportée
    pub fn is_supported(source: Crs, target: Crs) -> bool {
        Self::is_supported_epsg(source.epsg) && Self::is_supported_epsg(target.epsg)
    }

    /// Convertit les coordonnées source en géographique WGS84
    fn source_to_geographic(&self, x: f64, y: f64) -> Geographic {
        match self.source.epsg {
            2039 => {
                let local = TransverseMercator::israel_grid().inverse(x, y);
                ISRAEL_1993.local_to_wgs84(local)
            }
            3857 => mercator::web_mercator_to_geographic(x, y),
            _ => Geographic::from_degrees(x, y),
        }
    }

    /// Convertit les coordonnées géographiques WGS84 vers la cible
    fn geographic_to_target(&self, geo: Geographic) -> (f64, f64) {
        match self.target.epsg {
            2039 => {
                let local = ISRAEL_1993.wgs84_to_local(geo);
                TransverseMercator::israel_grid().forward(local)
            }
            3857 => mercator::geographic_to_web_mercator(geo),
            _ => geo.to_degrees(),
        }
    }
}

impl CrsTransform for ReprojectorLite {
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
        if self.source == Crs::WGS84 && (x.abs() > 180.0 || y.abs() > 90.0) {
            return Err(StrideError::reprojection(
                self.source.epsg,
                self.target.epsg,
                format!("({}, {}) is outside the WGS84 domain", x, y),
            ));
        }

        // Étape 1: Source → Géographique (WGS84)
        let geo = self.source_to_geographic(x, y);

        // Étape 2: Géographique → Cible
        Ok(self.geographic_to_target(geo))
    }
}

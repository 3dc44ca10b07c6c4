//! Changement de datum par similitude à 7 paramètres (Helmert)
//!
//! Convention « position vector » (celle de `+towgs84` dans PROJ).

use super::ellipsoid::{GRS80, WGS84};
use super::Geographic;

/// Secondes d'arc → radians
const ARCSEC: f64 = std::f64::consts::PI / (180.0 * 3600.0);

/// Paramètres datum local → WGS84
pub struct Helmert {
    tx: f64,
    ty: f64,
    tz: f64,
    /// Rotations en radians
    rx: f64,
    ry: f64,
    rz: f64,
    /// Facteur d'échelle (sans unité)
    s: f64,
}

/// Israel 1993 (GRS80) → WGS84
pub const ISRAEL_1993: Helmert = Helmert {
    tx: -24.0024,
    ty: -17.1032,
    tz: -17.8444,
    rx: -0.33077 * ARCSEC,
    ry: -1.85269 * ARCSEC,
    rz: 1.66969 * ARCSEC,
    s: 5.4248e-6,
};

impl Helmert {
    /// Coordonnées géographiques locales (GRS80) → WGS84
    pub fn local_to_wgs84(&self, geo: Geographic) -> Geographic {
        let (x, y, z) = geographic_to_ecef(geo, GRS80::A, GRS80::E2);
        let k = 1.0 + self.s;
        let xw = self.tx + k * (x - self.rz * y + self.ry * z);
        let yw = self.ty + k * (self.rz * x + y - self.rx * z);
        let zw = self.tz + k * (-self.ry * x + self.rx * y + z);
        ecef_to_geographic(xw, yw, zw, WGS84::A, WGS84::E2)
    }

    /// WGS84 → coordonnées géographiques locales (GRS80)
    ///
    /// Inverse par transposée de la rotation (angles de l'ordre de la seconde d'arc).
    pub fn wgs84_to_local(&self, geo: Geographic) -> Geographic {
        let (xw, yw, zw) = geographic_to_ecef(geo, WGS84::A, WGS84::E2);
        let (dx, dy, dz) = (xw - self.tx, yw - self.ty, zw - self.tz);
        let k = 1.0 / (1.0 + self.s);
        let x = k * (dx + self.rz * dy - self.ry * dz);
        let y = k * (-self.rz * dx + dy + self.rx * dz);
        let z = k * (self.ry * dx - self.rx * dy + dz);
        ecef_to_geographic(x, y, z, GRS80::A, GRS80::E2)
    }
}

/// Géographique (hauteur nulle) → géocentrique cartésien
fn geographic_to_ecef(geo: Geographic, a: f64, e2: f64) -> (f64, f64, f64) {
    let (sin_lat, cos_lat) = geo.lat.sin_cos();
    let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    (
        n * cos_lat * geo.lon.cos(),
        n * cos_lat * geo.lon.sin(),
        n * (1.0 - e2) * sin_lat,
    )
}

/// Géocentrique cartésien → géographique (itératif)
fn ecef_to_geographic(x: f64, y: f64, z: f64, a: f64, e2: f64) -> Geographic {
    let p = x.hypot(y);
    let lon = y.atan2(x);
    let mut lat = z.atan2(p * (1.0 - e2));

    for _ in 0..10 {
        let sin_lat = lat.sin();
        let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let new_lat = (z + e2 * n * sin_lat).atan2(p);
        if (new_lat - lat).abs() < 1e-14 {
            return Geographic::new(lon, new_lat);
        }
        lat = new_lat;
    }
    Geographic::new(lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let wgs = Geographic::from_degrees(34.78, 32.07);
        let local = ISRAEL_1993.wgs84_to_local(wgs);
        let back = ISRAEL_1993.local_to_wgs84(local);

        let (lon, lat) = back.to_degrees();
        assert!((lon - 34.78).abs() < 1e-8, "lon={}", lon);
        assert!((lat - 32.07).abs() < 1e-8, "lat={}", lat);
    }

    #[test]
    fn test_shift_magnitude() {
        // Le décalage entre les deux datums reste de l'ordre de la centaine de mètres
        let wgs = Geographic::from_degrees(35.2, 31.7);
        let (lon, lat) = ISRAEL_1993.wgs84_to_local(wgs).to_degrees();
        assert!((lon - 35.2).abs() > 1e-6);
        assert!((lon - 35.2).abs() < 0.002, "lon={}", lon);
        assert!((lat - 31.7).abs() < 0.002, "lat={}", lat);
    }

    #[test]
    fn test_ecef_roundtrip() {
        let geo = Geographic::from_degrees(-61.0, 14.6);
        let (x, y, z) = geographic_to_ecef(geo, WGS84::A, WGS84::E2);
        let back = ecef_to_geographic(x, y, z, WGS84::A, WGS84::E2);
        assert!((back.lon - geo.lon).abs() < 1e-12);
        assert!((back.lat - geo.lat).abs() < 1e-12);
    }
}

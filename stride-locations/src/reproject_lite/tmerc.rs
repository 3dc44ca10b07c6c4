//! Projection Transverse Mercator (séries de Snyder)
//!
//! Paramétrée pour l'Israeli Transverse Mercator (EPSG:2039), ellipsoïde GRS80.

use super::ellipsoid::GRS80;
use super::Geographic;

/// Paramètres d'une projection Transverse Mercator
pub struct TransverseMercator {
    /// Longitude du méridien central (radians)
    lon0: f64,
    /// Latitude d'origine (radians)
    lat0: f64,
    /// Facteur d'échelle sur le méridien central
    k0: f64,
    /// False easting
    x0: f64,
    /// False northing
    y0: f64,
}

impl TransverseMercator {
    /// Israeli Transverse Mercator (Israel 1993 / Israeli TM Grid)
    pub fn israel_grid() -> Self {
        Self {
            lon0: 35.204_516_944_444_4_f64.to_radians(),
            lat0: 31.734_393_611_111_1_f64.to_radians(),
            k0: 1.000_006_7,
            x0: 219_529.584,
            y0: 626_907.39,
        }
    }

    /// Géographique (datum local) → coordonnées projetées (mètres)
    pub fn forward(&self, geo: Geographic) -> (f64, f64) {
        let e2 = GRS80::E2;
        let ep2 = GRS80::EP2;

        let (sin_lat, cos_lat) = geo.lat.sin_cos();
        let tan_lat = geo.lat.tan();

        let n = GRS80::A / (1.0 - e2 * sin_lat.powi(2)).sqrt();
        let t = tan_lat.powi(2);
        let c = ep2 * cos_lat.powi(2);
        let a = (geo.lon - self.lon0) * cos_lat;

        let x = self.k0
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t.powi(2) + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0);

        let y = self.k0
            * (meridian_arc(geo.lat) - meridian_arc(self.lat0)
                + n * tan_lat
                    * (a.powi(2) / 2.0
                        + (5.0 - t + 9.0 * c + 4.0 * c.powi(2)) * a.powi(4) / 24.0
                        + (61.0 - 58.0 * t + t.powi(2) + 600.0 * c - 330.0 * ep2) * a.powi(6)
                            / 720.0));

        (x + self.x0, y + self.y0)
    }

    /// Coordonnées projetées → géographique (datum local)
    pub fn inverse(&self, x: f64, y: f64) -> Geographic {
        let a = GRS80::A;
        let e2 = GRS80::E2;
        let ep2 = GRS80::EP2;

        // Coordonnées réduites
        let x = x - self.x0;
        let y = y - self.y0;

        // Calcul du footprint latitude
        let m = meridian_arc(self.lat0) + y / self.k0;
        let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));

        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let sin_phi1 = phi1.sin();
        let cos_phi1 = phi1.cos();
        let tan_phi1 = phi1.tan();

        let n1 = a / (1.0 - e2 * sin_phi1.powi(2)).sqrt();
        let t1 = tan_phi1.powi(2);
        let c1 = ep2 * cos_phi1.powi(2);
        let r1 = a * (1.0 - e2) / (1.0 - e2 * sin_phi1.powi(2)).powf(1.5);
        let d = x / (n1 * self.k0);

        let lat = phi1
            - (n1 * tan_phi1 / r1)
                * (d.powi(2) / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4)
                        / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2)
                        - 252.0 * ep2
                        - 3.0 * c1.powi(2))
                        * d.powi(6)
                        / 720.0);

        let lon = self.lon0
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2
                    + 24.0 * t1.powi(2))
                    * d.powi(5)
                    / 120.0)
                / cos_phi1;

        Geographic::new(lon, lat)
    }
}

/// Longueur de l'arc de méridien depuis l'équateur
fn meridian_arc(lat: f64) -> f64 {
    let e2 = GRS80::E2;
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    GRS80::A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin() {
        let itm = TransverseMercator::israel_grid();
        let (x, y) = itm.forward(Geographic::new(itm.lon0, itm.lat0));
        assert!((x - 219_529.584).abs() < 1e-6, "x={}", x);
        assert!((y - 626_907.39).abs() < 1e-6, "y={}", y);
    }

    #[test]
    fn test_roundtrip() {
        let itm = TransverseMercator::israel_grid();
        for (lon, lat) in [(34.78, 32.07), (35.5, 33.2), (34.9, 29.55)] {
            let (x, y) = itm.forward(Geographic::from_degrees(lon, lat));
            let (lon2, lat2) = itm.inverse(x, y).to_degrees();
            assert!((lon2 - lon).abs() < 1e-7, "lon={} -> {}", lon, lon2);
            assert!((lat2 - lat).abs() < 1e-7, "lat={} -> {}", lat, lat2);
        }
    }

    #[test]
    fn test_meridian_arc_monotonic() {
        assert_eq!(meridian_arc(0.0), 0.0);
        assert!(meridian_arc(0.5) > meridian_arc(0.4));
    }
}

//! Projection Web Mercator (EPSG:3857)
//!
//! Aussi connu sous le nom de Pseudo-Mercator ou Spherical Mercator.
//! Utilisé par les fonds de carte web (OpenStreetMap, etc.), donc fréquent
//! pour les emprises saisies par l'utilisateur.

use super::ellipsoid::WGS84;
use super::Geographic;

/// Convertit coordonnées géographiques vers Web Mercator (EPSG:3857)
pub fn geographic_to_web_mercator(geo: Geographic) -> (f64, f64) {
    // Web Mercator utilise un modèle sphérique avec le rayon équatorial
    let r = WGS84::A;

    // Limiter la latitude pour éviter l'infini
    let lat = geo
        .lat
        .clamp(-85.0_f64.to_radians(), 85.0_f64.to_radians());

    let x = r * geo.lon;
    let y = r * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();

    (x, y)
}

/// Convertit Web Mercator vers coordonnées géographiques
pub fn web_mercator_to_geographic(x: f64, y: f64) -> Geographic {
    let r = WGS84::A;

    let lon = x / r;
    let lat = 2.0 * (y / r).exp().atan() - std::f64::consts::FRAC_PI_2;

    Geographic::new(lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tel_aviv_to_web_mercator() {
        // Tel Aviv: 34.78°E, 32.07°N
        let (x, y) = geographic_to_web_mercator(Geographic::from_degrees(34.78, 32.07));

        // X ≈ 3871700, Y ≈ 3772500
        assert!((x - 3_871_700.0).abs() < 1000.0, "x={}", x);
        assert!((y - 3_772_500.0).abs() < 1000.0, "y={}", y);
    }

    #[test]
    fn test_roundtrip() {
        let (x, y) = geographic_to_web_mercator(Geographic::from_degrees(34.78, 32.07));
        let (lon, lat) = web_mercator_to_geographic(x, y).to_degrees();

        assert!((lon - 34.78).abs() < 1e-9, "lon={}", lon);
        assert!((lat - 32.07).abs() < 1e-9, "lat={}", lat);
    }
}

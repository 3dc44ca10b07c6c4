//! Projection des coordonnées lon/lat vers le CRS de destination
//!
//! Les transformations elles-mêmes sont fournies par l'application via
//! [`TransformProvider`] ; ce module ne fait que les appliquer aux
//! enregistrements (points) et aux emprises de filtrage (rectangles).

use geo::{Coord, Point, Rect};
use serde_json::Value;
use tracing::warn;

use crate::types::{Crs, Extent, RawRecord};
use crate::StrideError;

/// Nombre de points échantillonnés par côté lors de la transformation d'une emprise
const EDGE_SAMPLES: usize = 21;

/// Transformation de coordonnées entre deux CRS
pub trait CrsTransform {
    /// CRS source
    fn source(&self) -> Crs;

    /// CRS cible
    fn target(&self) -> Crs;

    /// Transforme un point (x, y) du CRS source vers le CRS cible
    fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64), StrideError>;

    /// Transforme un rectangle en échantillonnant ses côtés puis en prenant
    /// l'emprise des points transformés (les bords ne restent pas droits).
    fn transform_rect(&self, rect: &Rect<f64>) -> Result<Rect<f64>, StrideError> {
        let min = rect.min();
        let max = rect.max();
        let mut xmin = f64::INFINITY;
        let mut ymin = f64::INFINITY;
        let mut xmax = f64::NEG_INFINITY;
        let mut ymax = f64::NEG_INFINITY;

        for i in 0..EDGE_SAMPLES {
            let t = i as f64 / (EDGE_SAMPLES - 1) as f64;
            let x = min.x + (max.x - min.x) * t;
            let y = min.y + (max.y - min.y) * t;

            for (px, py) in [(x, min.y), (x, max.y), (min.x, y), (max.x, y)] {
                let (tx, ty) = self.transform_point(px, py)?;
                if !tx.is_finite() || !ty.is_finite() {
                    continue;
                }
                xmin = xmin.min(tx);
                ymin = ymin.min(ty);
                xmax = xmax.max(tx);
                ymax = ymax.max(ty);
            }
        }

        if !xmin.is_finite() || !ymin.is_finite() {
            return Err(StrideError::reprojection(
                self.source().epsg,
                self.target().epsg,
                "no finite coordinate in transformed extent",
            ));
        }

        Ok(Rect::new(
            Coord { x: xmin, y: ymin },
            Coord { x: xmax, y: ymax },
        ))
    }
}

/// Fournisseur de transformations (registre de CRS de l'hôte)
pub trait TransformProvider {
    /// Construit une transformation réutilisable `from` → `to`
    fn transform(&self, from: Crs, to: Crs) -> Result<Box<dyn CrsTransform>, StrideError>;
}

/// Transformation identité (source == cible)
#[derive(Debug, Clone, Copy)]
pub struct IdentityTransform {
    crs: Crs,
}

impl IdentityTransform {
    pub fn new(crs: Crs) -> Self {
        Self { crs }
    }
}

impl CrsTransform for IdentityTransform {
    fn source(&self) -> Crs {
        self.crs
    }

    fn target(&self) -> Crs {
        self.crs
    }

    fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64), StrideError> {
        Ok((x, y))
    }

    fn transform_rect(&self, rect: &Rect<f64>) -> Result<Rect<f64>, StrideError> {
        Ok(*rect)
    }
}

/// Reprojette une emprise de filtrage vers WGS84
pub fn extent_to_wgs84(
    provider: &dyn TransformProvider,
    extent: &Extent,
) -> Result<Rect<f64>, StrideError> {
    if extent.crs == Crs::WGS84 {
        return Ok(extent.rect);
    }
    let transform = provider.transform(extent.crs, Crs::WGS84)?;
    transform.transform_rect(&extent.rect)
}

/// Résultat de la projection d'un enregistrement
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectedPoint {
    /// Point dans le CRS de destination
    Point(Point<f64>),
    /// lon ou lat absent / null
    Missing,
    /// Coordonnée non numérique ou transformation en échec
    Invalid(String),
}

impl ProjectedPoint {
    pub fn into_point(self) -> Option<Point<f64>> {
        match self {
            ProjectedPoint::Point(p) => Some(p),
            _ => None,
        }
    }
}

/// Projette les coordonnées WGS84 des enregistrements vers le CRS de destination
///
/// La transformation est construite une seule fois pour tout le lot ; le CRS
/// déclaré par la sortie doit être lu via [`GeometryProjector::dest_crs`].
pub struct GeometryProjector {
    transform: Box<dyn CrsTransform>,
}

impl GeometryProjector {
    /// Construit la transformation WGS84 → `dest`
    pub fn configure(provider: &dyn TransformProvider, dest: Crs) -> Result<Self, StrideError> {
        let transform = provider.transform(Crs::WGS84, dest)?;
        Ok(Self { transform })
    }

    /// CRS de destination effectivement utilisé pour les géométries
    pub fn dest_crs(&self) -> Crs {
        self.transform.target()
    }

    /// Projette une paire lon/lat brute
    pub fn project(&self, lon: Option<&Value>, lat: Option<&Value>) -> ProjectedPoint {
        let (Some(lon), Some(lat)) = (non_null(lon), non_null(lat)) else {
            return ProjectedPoint::Missing;
        };

        let (Some(x), Some(y)) = (coordinate(lon), coordinate(lat)) else {
            return ProjectedPoint::Invalid(format!("non-numeric coordinates ({}, {})", lon, lat));
        };

        match self.transform.transform_point(x, y) {
            Ok((px, py)) if px.is_finite() && py.is_finite() => {
                ProjectedPoint::Point(Point::new(px, py))
            }
            Ok(_) => ProjectedPoint::Invalid(format!("non-finite projection of ({}, {})", x, y)),
            Err(e) => {
                warn!(lon = x, lat = y, error = %e, "Point reprojection failed");
                ProjectedPoint::Invalid(e.to_string())
            }
        }
    }

    /// Projette les champs `lon`/`lat` d'un enregistrement brut
    pub fn project_record(&self, record: &RawRecord) -> ProjectedPoint {
        self.project(record.get("lon"), record.get("lat"))
    }
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Lit une coordonnée numérique (nombre JSON ou chaîne numérique)
fn coordinate(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Translation simple pour tester sans bibliothèque de projection
    struct Shift {
        source: Crs,
        target: Crs,
        dx: f64,
        dy: f64,
    }

    impl CrsTransform for Shift {
        fn source(&self) -> Crs {
            self.source
        }
        fn target(&self) -> Crs {
            self.target
        }
        fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64), StrideError> {
            Ok((x + self.dx, y + self.dy))
        }
    }

    struct ShiftProvider;

    impl TransformProvider for ShiftProvider {
        fn transform(&self, from: Crs, to: Crs) -> Result<Box<dyn CrsTransform>, StrideError> {
            if from == to {
                return Ok(Box::new(IdentityTransform::new(from)));
            }
            Ok(Box::new(Shift {
                source: from,
                target: to,
                dx: 100.0,
                dy: -50.0,
            }))
        }
    }

    #[test]
    fn test_project_numbers() {
        let projector = GeometryProjector::configure(&ShiftProvider, Crs::ISRAEL_GRID).unwrap();
        assert_eq!(projector.dest_crs(), Crs::ISRAEL_GRID);

        let p = projector.project(Some(&json!(34.5)), Some(&json!(32.25)));
        assert_eq!(p, ProjectedPoint::Point(Point::new(134.5, -17.75)));
    }

    #[test]
    fn test_project_numeric_strings() {
        let projector = GeometryProjector::configure(&ShiftProvider, Crs::ISRAEL_GRID).unwrap();
        let p = projector.project(Some(&json!(" 1.5 ")), Some(&json!("2")));
        assert_eq!(p, ProjectedPoint::Point(Point::new(101.5, -48.0)));
    }

    #[test]
    fn test_project_missing() {
        let projector = GeometryProjector::configure(&ShiftProvider, Crs::ISRAEL_GRID).unwrap();
        assert_eq!(
            projector.project(None, Some(&json!(32.0))),
            ProjectedPoint::Missing
        );
        assert_eq!(
            projector.project(Some(&Value::Null), Some(&json!(32.0))),
            ProjectedPoint::Missing
        );
    }

    #[test]
    fn test_project_invalid_text() {
        let projector = GeometryProjector::configure(&ShiftProvider, Crs::ISRAEL_GRID).unwrap();
        let p = projector.project(Some(&json!("east")), Some(&json!(32.0)));
        assert!(matches!(p, ProjectedPoint::Invalid(_)));
        assert_eq!(p.into_point(), None);

        let p = projector.project(Some(&json!(true)), Some(&json!(32.0)));
        assert!(matches!(p, ProjectedPoint::Invalid(_)));
    }

    #[test]
    fn test_project_record() {
        let projector = GeometryProjector::configure(&ShiftProvider, Crs::ISRAEL_GRID).unwrap();
        let record = json!({"lon": 1.0, "lat": 2.0, "id": 3});
        let p = projector.project_record(record.as_object().unwrap());
        assert_eq!(p.into_point(), Some(Point::new(101.0, -48.0)));
    }

    #[test]
    fn test_extent_wgs84_is_untouched() {
        let extent = Extent::new(34.0, 31.0, 35.0, 32.0, Crs::WGS84);
        let rect = extent_to_wgs84(&ShiftProvider, &extent).unwrap();
        assert_eq!(rect, extent.rect);
    }

    #[test]
    fn test_extent_matches_point_transform() {
        let extent = Extent::new(0.0, 0.0, 10.0, 20.0, Crs::ISRAEL_GRID);
        let rect = extent_to_wgs84(&ShiftProvider, &extent).unwrap();

        let shift = ShiftProvider.transform(Crs::ISRAEL_GRID, Crs::WGS84).unwrap();
        let (x0, y0) = shift.transform_point(0.0, 0.0).unwrap();
        let (x1, y1) = shift.transform_point(10.0, 20.0).unwrap();
        assert!((rect.min().x - x0).abs() < 1e-9);
        assert!((rect.min().y - y0).abs() < 1e-9);
        assert!((rect.max().x - x1).abs() < 1e-9);
        assert!((rect.max().y - y1).abs() < 1e-9);
    }

    #[test]
    fn test_identity_rect_roundtrip() {
        let rect = Rect::new((1.0, 2.0), (3.0, 4.0));
        let identity = IdentityTransform::new(Crs::WEB_MERCATOR);
        assert_eq!(identity.transform_rect(&rect).unwrap(), rect);
    }
}

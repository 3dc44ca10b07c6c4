//! Écriture des enregistrements récupérés dans une destination

use tracing::{debug, info, warn};

use stride::{
    CancellationToken, FetchOutcome, GeometryProjector, OutputRecord, ProgressReporter,
    ProjectedPoint, SchemaMapper, StrideError,
};

use super::sink::{GeometryKind, SinkHandle, SinkProvider};

/// Compteurs d'une écriture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitStats {
    /// Features écrites
    pub features: usize,
    /// Features sans géométrie (lon/lat absents)
    pub missing_geometry: usize,
    /// Features sans géométrie (coordonnées invalides ou reprojection en échec)
    pub invalid_geometry: usize,
    /// Enregistrements non traités suite à une annulation
    pub skipped: usize,
}

/// Résultat d'une écriture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Aucune donnée : aucune destination n'a été ouverte
    NoOutput,
    /// Destination écrite (éventuellement partiellement si annulé)
    Written {
        destination: SinkHandle,
        stats: EmitStats,
        cancelled: bool,
    },
}

/// Écrit les enregistrements dans une destination ouverte pour l'occasion
///
/// L'annulation est vérifiée avant chaque enregistrement ; la destination est
/// alors fermée proprement avec ce qui a déjà été écrit.
pub fn emit(
    outcome: FetchOutcome,
    mapper: &SchemaMapper,
    projector: &GeometryProjector,
    sink_provider: &mut dyn SinkProvider,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<EmitOutcome, StrideError> {
    let records = match outcome {
        FetchOutcome::NoData => return Ok(EmitOutcome::NoOutput),
        FetchOutcome::Records(records) => records,
    };

    let mut sink = sink_provider.open(mapper.schema(), GeometryKind::Point, projector.dest_crs())?;

    let total = records.len();
    progress.push_info(&format!("Processing {} features...", total));

    let mut stats = EmitStats::default();
    let mut cancelled = false;

    for (i, record) in records.iter().enumerate() {
        if cancel.is_cancelled() {
            cancelled = true;
            stats.skipped = total - i;
            info!(written = i, remaining = stats.skipped, "Cancellation requested");
            break;
        }

        let attributes = mapper.map(record);
        let geometry = match projector.project_record(record) {
            ProjectedPoint::Point(point) => Some(point),
            ProjectedPoint::Missing => {
                stats.missing_geometry += 1;
                None
            }
            ProjectedPoint::Invalid(reason) => {
                stats.invalid_geometry += 1;
                warn!(index = i, %reason, "Record written without geometry");
                None
            }
        };

        sink.add_feature(&OutputRecord {
            attributes,
            geometry,
        })?;
        stats.features += 1;

        progress.set_progress(((i + 1) * 100 / total) as u8);
    }

    let destination = sink.finish()?;
    debug!(
        destination = %destination,
        features = stats.features,
        cancelled,
        "Output finished"
    );

    Ok(EmitOutcome::Written {
        destination,
        stats,
        cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use serde_json::json;
    use stride::{AttributeValue, Crs, IdentityTransform, RawRecord, Schema, TransformProvider};

    use crate::export::sink::MemoryProvider;

    struct Identity;

    impl TransformProvider for Identity {
        fn transform(
            &self,
            from: Crs,
            _to: Crs,
        ) -> Result<Box<dyn stride::CrsTransform>, StrideError> {
            Ok(Box::new(IdentityTransform::new(from)))
        }
    }

    #[derive(Default)]
    struct Recorder {
        progress: RefCell<Vec<u8>>,
        infos: RefCell<Vec<String>>,
    }

    impl ProgressReporter for Recorder {
        fn set_progress(&self, percent: u8) {
            self.progress.borrow_mut().push(percent);
        }
        fn push_info(&self, message: &str) {
            self.infos.borrow_mut().push(message.to_string());
        }
    }

    fn record(value: serde_json::Value) -> RawRecord {
        value.as_object().unwrap().clone()
    }

    fn setup() -> (SchemaMapper, GeometryProjector) {
        (
            SchemaMapper::new(Schema::vehicle_locations()),
            GeometryProjector::configure(&Identity, Crs::WGS84).unwrap(),
        )
    }

    #[test]
    fn test_no_data_does_not_open_sink() {
        let (mapper, projector) = setup();
        let provider = MemoryProvider::new();
        let outcome = emit(
            FetchOutcome::NoData,
            &mapper,
            &projector,
            &mut provider.clone(),
            &Recorder::default(),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(outcome, EmitOutcome::NoOutput);
        assert_eq!(provider.store().opened, 0);
    }

    #[test]
    fn test_progress_and_geometry_counts() {
        let (mapper, projector) = setup();
        let provider = MemoryProvider::new();
        let recorder = Recorder::default();
        let records = vec![
            record(json!({"id": 1, "lon": 34.5, "lat": 32.0})),
            record(json!({"id": 2, "lon": null, "lat": 32.0})),
            record(json!({"id": 3, "lon": "east", "lat": 32.0})),
        ];

        let outcome = emit(
            FetchOutcome::Records(records),
            &mapper,
            &projector,
            &mut provider.clone(),
            &recorder,
            &CancellationToken::new(),
        )
        .unwrap();

        let EmitOutcome::Written {
            stats, cancelled, ..
        } = outcome
        else {
            panic!("expected written output");
        };
        assert!(!cancelled);
        assert_eq!(stats.features, 3);
        assert_eq!(stats.missing_geometry, 1);
        assert_eq!(stats.invalid_geometry, 1);

        assert_eq!(*recorder.progress.borrow(), vec![33, 66, 100]);
        assert_eq!(recorder.infos.borrow()[0], "Processing 3 features...");

        let store = provider.store();
        assert_eq!(store.records.len(), 3);
        assert_eq!(store.records[0].attributes[0], AttributeValue::Int(1));
        assert!(store.records[0].geometry.is_some());
        assert!(store.records[2].geometry.is_none());
        assert!(store.finished);
    }

    #[test]
    fn test_cancel_before_start() {
        let (mapper, projector) = setup();
        let provider = MemoryProvider::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = emit(
            FetchOutcome::Records(vec![record(json!({"id": 1}))]),
            &mapper,
            &projector,
            &mut provider.clone(),
            &Recorder::default(),
            &cancel,
        )
        .unwrap();

        assert!(matches!(
            outcome,
            EmitOutcome::Written {
                cancelled: true,
                stats: EmitStats { features: 0, skipped: 1, .. },
                ..
            }
        ));
        assert!(provider.store().finished);
    }

    #[test]
    fn test_sink_unavailable() {
        let (mapper, projector) = setup();
        let err = emit(
            FetchOutcome::Records(vec![record(json!({"id": 1}))]),
            &mapper,
            &projector,
            &mut MemoryProvider::failing("disk full"),
            &Recorder::default(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, StrideError::SinkUnavailable(_)));
    }
}

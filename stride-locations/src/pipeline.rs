//! Orchestration : requête → appel HTTP → conversion → projection → sortie

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::info;

use stride::query::{
    DEFAULT_API_PATH, DEFAULT_BASE_URL, DEFAULT_DURATION_MINUTES, DEFAULT_EXTRA_PARAMS,
};
use stride::{
    CancellationToken, Crs, Extent, GeometryProjector, HttpFetcher, HttpTransport,
    ProgressReporter, QueryBuilder, Schema, SchemaMapper, StrideError, TransformProvider,
};

use crate::export::{emit, EmitOutcome, SinkProvider};
use crate::report::RunReport;

/// Paramètres d'une exécution
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// URL de base de l'API
    pub base_url: String,
    /// Chemin de l'endpoint (ex. `/siri_vehicle_locations/list`)
    pub api_path: String,
    /// Paramètres additionnels (littéral de mapping)
    pub extra_params: String,
    /// Emprise de filtrage (dans son propre CRS)
    pub extent: Option<Extent>,
    /// Début de la fenêtre temporelle
    pub start_time: Option<DateTime<Utc>>,
    /// Durée de la fenêtre en minutes (ignorée sans `start_time`)
    pub duration_minutes: i64,
    /// CRS des géométries produites
    pub dest_crs: Crs,
    pub schema: Schema,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_path: DEFAULT_API_PATH.to_string(),
            extra_params: DEFAULT_EXTRA_PARAMS.to_string(),
            extent: None,
            start_time: None,
            duration_minutes: DEFAULT_DURATION_MINUTES,
            dest_crs: Crs::ISRAEL_GRID,
            schema: Schema::vehicle_locations(),
        }
    }
}

/// Résultat d'une exécution
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub emit: EmitOutcome,
    pub report: RunReport,
}

/// Exécute une récupération complète
///
/// Les erreurs terminales (paramètres, réseau, statut HTTP, JSON, sortie)
/// interrompent l'exécution ; l'absence de données et l'annulation sont des
/// issues normales visibles dans le rapport.
pub fn run<T: HttpTransport>(
    request: &RunRequest,
    fetcher: &HttpFetcher<T>,
    provider: &dyn TransformProvider,
    sink_provider: &mut dyn SinkProvider,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<RunOutcome, StrideError> {
    let start = Instant::now();

    // Transformation de sortie construite avant tout appel réseau
    let projector = GeometryProjector::configure(provider, request.dest_crs)?;
    let mapper = SchemaMapper::new(request.schema.clone());

    let query = QueryBuilder::new(&request.base_url, provider).build(
        &request.api_path,
        &request.extra_params,
        request.extent.as_ref(),
        request.start_time,
        request.duration_minutes,
    )?;

    let mut report = RunReport::new(&query.url, &projector.dest_crs().to_string());
    progress.push_info(&format!("Requesting data from: {}", query.url));
    for message in &query.messages {
        info!("{}", message);
        progress.push_info(message);
        report.record_message(message);
    }

    let outcome = fetcher.fetch(&query.url)?;
    report.records_fetched = outcome.len();
    info!(records = outcome.len(), "Records received");
    if outcome.is_empty() {
        progress.push_info("No data returned from API.");
    }

    let emitted = emit(outcome, &mapper, &projector, sink_provider, progress, cancel)?;
    report.record_emit(&emitted);
    report.set_duration(start.elapsed());
    report.finalize();

    info!(summary = %report.summary(), "Run finished");

    Ok(RunOutcome {
        emit: emitted,
        report,
    })
}

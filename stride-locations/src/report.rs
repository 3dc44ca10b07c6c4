//! Rapport d'exécution
//!
//! Collecte les compteurs et messages d'une exécution pour l'affichage
//! final et la sauvegarde JSON (`--report`).

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::export::{EmitOutcome, EmitStats};

/// Statut global de l'exécution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Toutes les features ont une géométrie
    Success,
    /// Des features ont été écrites sans géométrie
    PartialSuccess,
    /// Exécution interrompue par l'utilisateur (sortie partielle conservée)
    Cancelled,
    /// L'API n'a renvoyé aucun enregistrement
    NoData,
}

/// Rapport complet d'exécution
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// URL interrogée
    pub url: String,
    /// Durée totale
    pub duration_secs: f64,
    /// Statut global
    pub status: RunStatus,

    /// CRS des géométries écrites
    pub dest_crs: String,
    /// Destination produite (fichier ou table)
    pub destination: Option<String>,

    /// Nombre d'enregistrements reçus
    pub records_fetched: usize,
    /// Nombre de features écrites
    pub features_written: usize,
    /// Features sans lon/lat
    pub missing_geometry: usize,
    /// Features dont les coordonnées n'ont pas pu être projetées
    pub invalid_geometry: usize,
    /// Enregistrements non écrits après annulation
    pub skipped: usize,

    /// Messages informatifs (filtres appliqués, ...)
    pub messages: Vec<String>,
}

impl RunReport {
    /// Crée un nouveau rapport pour une URL
    pub fn new(url: &str, dest_crs: &str) -> Self {
        Self {
            url: url.to_string(),
            duration_secs: 0.0,
            status: RunStatus::Success,
            dest_crs: dest_crs.to_string(),
            destination: None,
            records_fetched: 0,
            features_written: 0,
            missing_geometry: 0,
            invalid_geometry: 0,
            skipped: 0,
            messages: Vec::new(),
        }
    }

    /// Enregistre un message informatif
    pub fn record_message(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }

    /// Enregistre le résultat de l'écriture
    pub fn record_emit(&mut self, outcome: &EmitOutcome) {
        match outcome {
            EmitOutcome::NoOutput => self.status = RunStatus::NoData,
            EmitOutcome::Written {
                destination,
                stats,
                cancelled,
            } => {
                let EmitStats {
                    features,
                    missing_geometry,
                    invalid_geometry,
                    skipped,
                } = stats;
                self.destination = Some(destination.to_string());
                self.features_written = *features;
                self.missing_geometry = *missing_geometry;
                self.invalid_geometry = *invalid_geometry;
                self.skipped = *skipped;
                if *cancelled {
                    self.status = RunStatus::Cancelled;
                }
            }
        }
    }

    /// Définit la durée de l'exécution
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        if matches!(self.status, RunStatus::NoData | RunStatus::Cancelled) {
            return;
        }
        self.status = if self.missing_geometry + self.invalid_geometry > 0 {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Success
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("STRIDE VEHICLE LOCATIONS");
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);
        println!("URL: {}", self.url);

        println!("\n--- SUMMARY ---");
        println!("Records fetched: {}", self.records_fetched);
        println!(
            "Features written: {} ({})",
            self.features_written, self.dest_crs
        );
        if let Some(destination) = &self.destination {
            println!("Destination: {}", destination);
        }
        if self.missing_geometry + self.invalid_geometry > 0 {
            println!(
                "Without geometry: {} missing, {} invalid",
                self.missing_geometry, self.invalid_geometry
            );
        }
        if self.skipped > 0 {
            println!("Skipped after cancellation: {}", self.skipped);
        }

        if !self.messages.is_empty() {
            println!("\n--- MESSAGES ---");
            for m in &self.messages {
                println!("  {}", m);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{:?}: {} fetched, {} written, {} without geometry",
            self.status,
            self.records_fetched,
            self.features_written,
            self.missing_geometry + self.invalid_geometry
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::SinkHandle;

    fn written(stats: EmitStats, cancelled: bool) -> EmitOutcome {
        EmitOutcome::Written {
            destination: SinkHandle::Memory,
            stats,
            cancelled,
        }
    }

    #[test]
    fn test_finalize_success() {
        let mut report = RunReport::new("http://x", "EPSG:2039");
        report.record_emit(&written(
            EmitStats {
                features: 2,
                ..Default::default()
            },
            false,
        ));
        report.finalize();

        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.destination.as_deref(), Some("memory"));
    }

    #[test]
    fn test_finalize_partial_success() {
        let mut report = RunReport::new("http://x", "EPSG:2039");
        report.record_emit(&written(
            EmitStats {
                features: 2,
                missing_geometry: 1,
                ..Default::default()
            },
            false,
        ));
        report.finalize();

        assert_eq!(report.status, RunStatus::PartialSuccess);
    }

    #[test]
    fn test_cancelled_wins() {
        let mut report = RunReport::new("http://x", "EPSG:2039");
        report.record_emit(&written(
            EmitStats {
                features: 1,
                invalid_geometry: 1,
                skipped: 4,
                ..Default::default()
            },
            true,
        ));
        report.finalize();

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.skipped, 4);
    }

    #[test]
    fn test_no_data() {
        let mut report = RunReport::new("http://x", "EPSG:2039");
        report.record_emit(&EmitOutcome::NoOutput);
        report.finalize();

        assert_eq!(report.status, RunStatus::NoData);
        assert!(report.destination.is_none());
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let mut report = RunReport::new("http://x", "EPSG:2039");
        report.record_message("Filtering from start time: 2024-01-01T00:00:00.000Z");
        report.records_fetched = 3;
        report.save_to_file(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "Success");
        assert_eq!(value["records_fetched"], 3);
        assert_eq!(value["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_summary() {
        let report = RunReport::new("http://x", "EPSG:2039");
        assert_eq!(report.summary(), "Success: 0 fetched, 0 written, 0 without geometry");
    }
}

//! Retour d'avancement et annulation coopérative

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Reçoit l'avancement et les messages informatifs d'une opération
pub trait ProgressReporter {
    /// Avancement en pourcentage (0..=100), monotone
    fn set_progress(&self, percent: u8);

    /// Message informatif destiné à l'utilisateur
    fn push_info(&self, message: &str);
}

/// Rapporteur qui ignore tout
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn set_progress(&self, _percent: u8) {}

    fn push_info(&self, _message: &str) {}
}

/// Jeton d'annulation partagé entre l'appelant et l'opération
#[derive(Debug, Default, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Demande l'arrêt ; l'opération s'arrête au prochain point de contrôle
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

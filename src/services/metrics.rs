use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::errors::{AppError, Result};

/// Outcome label for admission counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Allowed,
    Denied,
    FailOpen,
}

impl AdmissionOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            AdmissionOutcome::Allowed => "allowed",
            AdmissionOutcome::Denied => "denied",
            AdmissionOutcome::FailOpen => "fail_open",
        }
    }
}

pub struct MetricsService {
    registry: Registry,
    admissions: IntCounterVec,
    definitions_created: IntCounter,
    definitions_deleted: IntCounter,
    handlers_skipped: IntCounter,
    http_errors: IntCounterVec,
}

impl MetricsService {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let admissions = IntCounterVec::new(
            Opts::new("quota_admissions_total", "Admission decisions by codename and outcome"),
            &["codename", "outcome"],
        )
        .map_err(metrics_error)?;
        let definitions_created = IntCounter::new(
            "quota_definitions_created_total",
            "Definitions created by sync",
        )
        .map_err(metrics_error)?;
        let definitions_deleted = IntCounter::new(
            "quota_definitions_deleted_total",
            "Definitions deleted by sync",
        )
        .map_err(metrics_error)?;
        let handlers_skipped = IntCounter::new(
            "quota_handlers_skipped_total",
            "Handler references skipped by sync",
        )
        .map_err(metrics_error)?;
        let http_errors = IntCounterVec::new(
            Opts::new("quota_http_errors_total", "HTTP responses with an error status"),
            &["type"],
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(admissions.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(definitions_created.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(definitions_deleted.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(handlers_skipped.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(http_errors.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            admissions,
            definitions_created,
            definitions_deleted,
            handlers_skipped,
            http_errors,
        })
    }

    pub fn record_admission(&self, codename: &str, outcome: AdmissionOutcome) {
        self.admissions
            .with_label_values(&[codename, outcome.as_str()])
            .inc();
    }

    pub fn record_sync(&self, created: usize, deleted: usize, skipped: usize) {
        self.definitions_created.inc_by(created as u64);
        self.definitions_deleted.inc_by(deleted as u64);
        self.handlers_skipped.inc_by(skipped as u64);
    }

    pub fn record_error(&self, error_type: &str) {
        self.http_errors.with_label_values(&[error_type]).inc();
    }

    pub fn admission_count(&self, codename: &str, outcome: AdmissionOutcome) -> u64 {
        self.admissions
            .with_label_values(&[codename, outcome.as_str()])
            .get()
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| AppError::Internal(e.into()))
    }
}

fn metrics_error(e: prometheus::Error) -> AppError {
    AppError::Internal(anyhow::anyhow!("metrics: {}", e))
}

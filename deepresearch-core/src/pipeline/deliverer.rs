//! Delivery stage: hand the finished report to the mail capability.

use super::writer::Report;
use crate::error::{ResearchError, Stage};
use crate::mail::Mailer;
use std::sync::Arc;
use tracing::info;

const MAX_SUBJECT_LEN: usize = 120;
const FALLBACK_SUBJECT: &str = "Research report";

/// The delivery stage adapter.
pub struct Deliverer {
    mailer: Arc<dyn Mailer>,
    to_address: String,
}

impl Deliverer {
    pub fn new(mailer: Arc<dyn Mailer>, to_address: impl Into<String>) -> Self {
        Self {
            mailer,
            to_address: to_address.into(),
        }
    }

    /// Derive a single-line subject from the report's short summary.
    fn subject_for(report: &Report) -> String {
        let first_line = report
            .short_summary
            .lines()
            .next()
            .unwrap_or("")
            .trim();
        if first_line.is_empty() {
            return FALLBACK_SUBJECT.to_string();
        }
        let mut subject: String = first_line.chars().take(MAX_SUBJECT_LEN).collect();
        if first_line.chars().count() > MAX_SUBJECT_LEN {
            subject.push('…');
        }
        subject
    }

    /// Send the rendered report. A mail failure aborts the run as a stage
    /// failure; there is no downstream consumer to shield.
    pub async fn deliver(&self, report: &Report) -> Result<(), ResearchError> {
        let subject = Self::subject_for(report);
        self.mailer
            .send(&self.to_address, &subject, &report.markdown_report)
            .await
            .map_err(|e| ResearchError::stage(Stage::Deliverer, e))?;
        info!(to = %self.to_address, "report delivered");
        Ok(())
    }
}

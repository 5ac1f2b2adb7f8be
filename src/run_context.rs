//! Run Context & Batch Ledger: the value object threaded through every ETL
//! stage, finally serialized into the `etl_batches` table for audit.
//!
//! Replaces the source's free-floating dict parameters ("threading
//! parameters everywhere") with one owned struct passed by `&mut` through
//! the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Plan,
    StageOnly,
    Promote,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Staging,
    Validating,
    Promoting,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggeredBy {
    Manual,
    Cron,
    GithubAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub issue_type: String,
    pub message: String,
    #[serde(flatten)]
    pub details: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticWarning {
    pub warning_type: String,
    pub message: String,
    #[serde(flatten)]
    pub details: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub batch_id: Uuid,

    pub schema_version: String,
    pub rules_version: String,
    pub contract_hash: String,
    pub header_fingerprint: String,

    pub run_mode: RunMode,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    pub status: BatchStatus,

    pub file_fingerprints: BTreeMap<String, String>,
    pub total_files: u32,
    pub batch_fingerprint: String,

    pub contract_report: Option<serde_json::Value>,

    pub source_row_count: Option<u64>,
    pub rows_rejected: u64,
    pub rows_skipped: u64,

    pub rows_loaded: u64,
    pub rows_after_dedup: u64,
    pub rows_outliers_marked: u64,
    pub rows_promoted: u64,
    pub rows_skipped_collision: u64,

    pub validation_issues: Vec<ValidationIssue>,
    pub semantic_warnings: Vec<SemanticWarning>,
    pub validation_passed: bool,

    pub error_message: Option<String>,
    pub error_stage: Option<String>,

    pub triggered_by: TriggeredBy,
}

impl RunContext {
    pub fn new(run_mode: RunMode, triggered_by: TriggeredBy) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            schema_version: String::new(),
            rules_version: String::new(),
            contract_hash: String::new(),
            header_fingerprint: String::new(),
            run_mode,
            started_at: Utc::now(),
            completed_at: None,
            status: BatchStatus::Staging,
            file_fingerprints: BTreeMap::new(),
            total_files: 0,
            batch_fingerprint: String::new(),
            contract_report: None,
            source_row_count: None,
            rows_rejected: 0,
            rows_skipped: 0,
            rows_loaded: 0,
            rows_after_dedup: 0,
            rows_outliers_marked: 0,
            rows_promoted: 0,
            rows_skipped_collision: 0,
            validation_issues: Vec::new(),
            semantic_warnings: Vec::new(),
            validation_passed: true,
            error_message: None,
            error_stage: None,
            triggered_by,
        }
    }

    pub fn mark_stage(&mut self, stage: BatchStatus) {
        self.status = stage;
    }

    /// Recomputes `batch_fingerprint` from the current `file_fingerprints`
    /// map. Called once all files for this run have been loaded, so the
    /// ledger carries a single whole-batch digest alongside the per-file
    /// ones without re-hashing any file content.
    pub fn recompute_batch_fingerprint(&mut self) {
        self.batch_fingerprint = crate::fingerprint::compute_batch_fingerprint(&self.file_fingerprints);
    }

    pub fn add_validation_issue(&mut self, issue_type: impl Into<String>, message: impl Into<String>) {
        self.validation_issues.push(ValidationIssue {
            issue_type: issue_type.into(),
            message: message.into(),
            details: BTreeMap::new(),
        });
        self.validation_passed = false;
    }

    pub fn add_semantic_warning(&mut self, warning_type: impl Into<String>, message: impl Into<String>) {
        self.semantic_warnings.push(SemanticWarning {
            warning_type: warning_type.into(),
            message: message.into(),
            details: BTreeMap::new(),
        });
    }

    pub fn fail(&mut self, stage: impl Into<String>, message: impl Into<String>) {
        self.status = BatchStatus::Failed;
        self.error_stage = Some(stage.into());
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.status = BatchStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// `(is_ok, unaccounted, message)`. `is_ok` is `None` when
    /// `source_row_count` was never set (e.g. an API-sourced run with no
    /// byte-count notion).
    pub fn reconciliation_check(&self) -> (Option<bool>, Option<i64>, String) {
        let Some(source) = self.source_row_count else {
            return (None, None, "source_row_count not set".to_string());
        };
        let accounted = self.rows_loaded + self.rows_rejected + self.rows_skipped;
        let unaccounted = source as i64 - accounted as i64;
        if unaccounted == 0 {
            (Some(true), Some(0), "OK: all rows accounted for".to_string())
        } else {
            (
                Some(false),
                Some(unaccounted),
                format!("MISMATCH: {unaccounted} rows unaccounted"),
            )
        }
    }

    pub fn summary(&self) -> String {
        let elapsed = (self.completed_at.unwrap_or_else(Utc::now) - self.started_at)
            .num_milliseconds() as f64
            / 1000.0;
        let mut lines = vec![
            format!("Batch ID: {}...", &self.batch_id.to_string()[..8]),
            format!("Status: {:?}", self.status),
            format!("Schema: {} | Rules: {}", self.schema_version, self.rules_version),
            format!("Files: {}", self.total_files),
        ];

        if let Some(source) = self.source_row_count {
            let accounted = self.rows_loaded + self.rows_rejected + self.rows_skipped;
            let unaccounted = source as i64 - accounted as i64;
            lines.push(format!(
                "Source: {} = loaded({}) + rejected({}) + skipped({}) [unaccounted: {}]",
                source, self.rows_loaded, self.rows_rejected, self.rows_skipped, unaccounted
            ));
        } else {
            lines.push(format!("Rows loaded: {}", self.rows_loaded));
        }

        lines.push(format!(
            "Pipeline: dedup={}, outliers={}, promoted={}, collisions={}",
            self.rows_after_dedup, self.rows_outliers_marked, self.rows_promoted, self.rows_skipped_collision
        ));
        lines.push(format!("Elapsed: {elapsed:.1}s"));

        if let Some(msg) = &self.error_message {
            lines.push(format!("Error: {}: {}", self.error_stage.as_deref().unwrap_or(""), msg));
        }
        if !self.validation_issues.is_empty() {
            lines.push(format!("Validation issues: {}", self.validation_issues.len()));
        }
        if !self.semantic_warnings.is_empty() {
            lines.push(format!("Semantic warnings: {}", self.semantic_warnings.len()));
        }

        lines.join("\n")
    }

    /// Upserts this ledger row into `etl_batches`. Called at the end of
    /// every run (success or failure) so a batch's outcome is always
    /// auditable, even for runs that never reach `Promote`.
    pub async fn persist(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        let run_mode = serde_json::to_value(self.run_mode).unwrap_or_default();
        let status = serde_json::to_value(self.status).unwrap_or_default();
        let triggered_by = serde_json::to_value(&self.triggered_by).unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO etl_batches (
                batch_id, schema_version, rules_version, contract_hash, header_fingerprint,
                batch_fingerprint, run_mode, status, started_at, completed_at, file_fingerprints,
                total_files, contract_report, source_row_count, rows_rejected, rows_skipped,
                rows_loaded, rows_after_dedup, rows_outliers_marked, rows_promoted,
                rows_skipped_collision, validation_issues, semantic_warnings, validation_passed,
                error_message, error_stage, triggered_by
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27
            )
            ON CONFLICT (batch_id) DO UPDATE SET
                status = EXCLUDED.status,
                completed_at = EXCLUDED.completed_at,
                source_row_count = EXCLUDED.source_row_count,
                rows_rejected = EXCLUDED.rows_rejected,
                rows_skipped = EXCLUDED.rows_skipped,
                rows_loaded = EXCLUDED.rows_loaded,
                rows_after_dedup = EXCLUDED.rows_after_dedup,
                rows_outliers_marked = EXCLUDED.rows_outliers_marked,
                rows_promoted = EXCLUDED.rows_promoted,
                rows_skipped_collision = EXCLUDED.rows_skipped_collision,
                validation_issues = EXCLUDED.validation_issues,
                semantic_warnings = EXCLUDED.semantic_warnings,
                validation_passed = EXCLUDED.validation_passed,
                error_message = EXCLUDED.error_message,
                error_stage = EXCLUDED.error_stage
            "#,
        )
        .bind(self.batch_id)
        .bind(&self.schema_version)
        .bind(&self.rules_version)
        .bind(&self.contract_hash)
        .bind(&self.header_fingerprint)
        .bind(&self.batch_fingerprint)
        .bind(run_mode.as_str().unwrap_or_default())
        .bind(status.as_str().unwrap_or_default())
        .bind(self.started_at)
        .bind(self.completed_at)
        .bind(serde_json::to_value(&self.file_fingerprints).unwrap_or_default())
        .bind(self.total_files as i32)
        .bind(&self.contract_report)
        .bind(self.source_row_count.map(|v| v as i64))
        .bind(self.rows_rejected as i64)
        .bind(self.rows_skipped as i64)
        .bind(self.rows_loaded as i64)
        .bind(self.rows_after_dedup as i64)
        .bind(self.rows_outliers_marked as i64)
        .bind(self.rows_promoted as i64)
        .bind(self.rows_skipped_collision as i64)
        .bind(serde_json::to_value(&self.validation_issues).unwrap_or_default())
        .bind(serde_json::to_value(&self.semantic_warnings).unwrap_or_default())
        .bind(self.validation_passed)
        .bind(&self.error_message)
        .bind(&self.error_stage)
        .bind(triggered_by.as_str().unwrap_or_default())
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconciliation_check_ok_when_fully_accounted() {
        let mut ctx = RunContext::new(RunMode::Full, TriggeredBy::Manual);
        ctx.source_row_count = Some(10);
        ctx.rows_loaded = 8;
        ctx.rows_rejected = 1;
        ctx.rows_skipped = 1;
        let (ok, unaccounted, _) = ctx.reconciliation_check();
        assert_eq!(ok, Some(true));
        assert_eq!(unaccounted, Some(0));
    }

    #[test]
    fn reconciliation_check_flags_mismatch() {
        let mut ctx = RunContext::new(RunMode::Full, TriggeredBy::Manual);
        ctx.source_row_count = Some(10);
        ctx.rows_loaded = 5;
        let (ok, unaccounted, _) = ctx.reconciliation_check();
        assert_eq!(ok, Some(false));
        assert_eq!(unaccounted, Some(5));
    }

    #[test]
    fn fail_sets_terminal_state() {
        let mut ctx = RunContext::new(RunMode::Full, TriggeredBy::Manual);
        ctx.fail("loading", "header mismatch");
        assert_eq!(ctx.status, BatchStatus::Failed);
        assert_eq!(ctx.error_stage.as_deref(), Some("loading"));
        assert!(ctx.completed_at.is_some());
    }

    #[test]
    fn add_validation_issue_flips_validation_passed() {
        let mut ctx = RunContext::new(RunMode::Full, TriggeredBy::Manual);
        assert!(ctx.validation_passed);
        ctx.add_validation_issue("invariant", "price must be positive");
        assert!(!ctx.validation_passed);
    }
}

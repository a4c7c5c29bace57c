//! Bulk operation orchestrator: batch generation, CSV import, batch undo,
//! and inline bulk-edit commit, plus the explicit single-certificate
//! create/update operations.
//!
//! Each operation is a short-lived, one-shot sequence. Within an operation
//! the per-record writes are issued concurrently and awaited jointly; the
//! must-succeed certificate writes and the best-effort ledger write are
//! joined with different failure policies. Partial failures are surfaced to
//! the caller, never rolled back (the underlying store is not transactional
//! across documents).

use crate::csv::parse_rows;
use crate::db::{self, Pool};
use crate::error::OpError;
use crate::ledger::BatchLedger;
use crate::model::{Batch, BatchKind, Certificate, CertificatePatch, NewCertificate};
use chrono::Utc;
use futures::future::try_join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Certificate IDs appear in shareable verification URLs, so restrict them
/// to a URL-safe charset.
static CERT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid regex"));

/// Parameters for one batch-generate run.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchGenerateRequest {
    pub prefix: String,
    pub start: i64,
    pub count: u32,
    pub event: String,
    pub date: String,
}

/// Result of a bulk creation operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub batch_id: String,
    pub written: usize,
}

/// Locally buffered inline edits, keyed by certificate ID. Edits merge per
/// field with last-write-wins; nothing is written until `commit_edits`.
/// Cancelling is just dropping the buffer.
#[derive(Debug, Default)]
pub struct EditBuffer {
    pending: HashMap<String, CertificatePatch>,
}

impl EditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, id: impl Into<String>, patch: CertificatePatch) {
        self.pending.entry(id.into()).or_default().merge(patch);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    fn into_pending(self) -> HashMap<String, CertificatePatch> {
        self.pending
    }
}

impl From<HashMap<String, CertificatePatch>> for EditBuffer {
    fn from(pending: HashMap<String, CertificatePatch>) -> Self {
        Self { pending }
    }
}

/// Drives all certificate mutations. Owns no state beyond its handles; every
/// collaborator is injected by the composition root.
pub struct Orchestrator {
    pool: Pool,
    ledger: Arc<dyn BatchLedger>,
    issuer: String,
    max_batch_count: u32,
}

impl Orchestrator {
    pub fn new(
        pool: Pool,
        ledger: Arc<dyn BatchLedger>,
        issuer: impl Into<String>,
        max_batch_count: u32,
    ) -> Self {
        Self {
            pool,
            ledger,
            issuer: issuer.into(),
            max_batch_count,
        }
    }

    pub fn ledger(&self) -> &dyn BatchLedger {
        self.ledger.as_ref()
    }

    /// Issue a single certificate under a caller-chosen ID. Unlike the bulk
    /// paths this rejects a duplicate ID instead of overwriting.
    #[instrument(skip_all, fields(id = %input.id))]
    pub async fn create_certificate(
        &self,
        mut input: NewCertificate,
    ) -> Result<Certificate, OpError> {
        if !CERT_ID_RE.is_match(&input.id) {
            return Err(OpError::validation(
                "certificate ID must use letters, digits, '.', '_' or '-'",
            ));
        }
        if input.student_name.trim().is_empty() {
            return Err(OpError::validation("student name must be non-empty"));
        }
        if input.issued_by.trim().is_empty() {
            input.issued_by = self.issuer.clone();
        }
        // Created outside a bulk operation: never tagged, never a placeholder.
        input.batch_id = None;
        input.is_placeholder = false;

        db::create_certificate(&self.pool, &input).await?;
        db::get_certificate(&self.pool, &input.id)
            .await?
            .ok_or_else(|| OpError::not_found(format!("certificate {}", input.id)))
    }

    /// Apply a partial edit to one certificate.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn update_certificate(
        &self,
        id: &str,
        patch: CertificatePatch,
    ) -> Result<Certificate, OpError> {
        db::update_certificate(&self.pool, id, &patch).await?;
        db::get_certificate(&self.pool, id)
            .await?
            .ok_or_else(|| OpError::not_found(format!("certificate {id}")))
    }

    /// Generate `count` placeholder certificates with sequential IDs
    /// `prefix + zero-padded(start + i)`.
    ///
    /// Overlapping ID ranges silently overwrite prior placeholders (upsert
    /// semantics); see the pinning test in `tests/bulk_ops.rs`.
    #[instrument(skip_all, fields(prefix = %req.prefix, count = req.count))]
    pub async fn batch_generate(&self, req: &BatchGenerateRequest) -> Result<BulkOutcome, OpError> {
        if req.count == 0 {
            return Err(OpError::validation("count must be greater than zero"));
        }
        if req.count > self.max_batch_count {
            return Err(OpError::validation(format!(
                "count exceeds the batch limit of {}",
                self.max_batch_count
            )));
        }
        let first_id = format!("{}{:03}", req.prefix, req.start);
        if !CERT_ID_RE.is_match(&first_id) {
            return Err(OpError::validation(
                "prefix must produce IDs using letters, digits, '.', '_' or '-'",
            ));
        }

        let batch_id = self.ledger.new_batch_id();
        let description = format!(
            "Batch: {}{}... ({} items)",
            req.prefix, req.start, req.count
        );
        let records: Vec<NewCertificate> = (0..req.count as i64)
            .map(|i| NewCertificate {
                id: format!("{}{:03}", req.prefix, req.start + i),
                student_name: "TBD".to_string(),
                event: req.event.clone(),
                position: "Participant".to_string(),
                date: req.date.clone(),
                issued_by: self.issuer.clone(),
                is_placeholder: true,
                batch_id: Some(batch_id.clone()),
            })
            .collect();

        self.write_batch(&batch_id, BatchKind::BatchGenerate, &records, &description)
            .await?;
        info!(%batch_id, count = records.len(), "generated certificate batch");
        Ok(BulkOutcome {
            batch_id,
            written: records.len(),
        })
    }

    /// Import certificates from CSV text. Rows missing an ID or a student
    /// name are skipped (logged) and excluded from the reported count.
    /// Recognized headers: `id`/`certificate id`, `name`/`student name`,
    /// `event`, `position`, `date`, `issued by`/`issuedby`.
    #[instrument(skip_all, fields(filename = %filename))]
    pub async fn import_csv(&self, text: &str, filename: &str) -> Result<BulkOutcome, OpError> {
        let rows = parse_rows(text);
        if rows.is_empty() {
            return Err(OpError::EmptyCsv);
        }

        let batch_id = self.ledger.new_batch_id();
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let mut records = Vec::new();
        for row in &rows {
            let field = |key: &str| {
                row.get(key)
                    .map(String::as_str)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };
            let id = field("id").or_else(|| field("certificate id"));
            let name = field("name").or_else(|| field("student name"));
            let (Some(id), Some(name)) = (id, name) else {
                warn!(?row, "skipping CSV row without id or name");
                continue;
            };
            records.push(NewCertificate {
                id,
                student_name: name,
                event: field("event").unwrap_or_default(),
                position: field("position").unwrap_or_else(|| "Participant".to_string()),
                date: field("date").unwrap_or_else(|| today.clone()),
                issued_by: field("issued by")
                    .or_else(|| field("issuedby"))
                    .unwrap_or_else(|| self.issuer.clone()),
                is_placeholder: false,
                batch_id: Some(batch_id.clone()),
            });
        }
        if records.is_empty() {
            return Err(OpError::NoValidRows);
        }

        let description = format!("CSV Upload: {} ({} items)", filename, records.len());
        self.write_batch(&batch_id, BatchKind::CsvUpload, &records, &description)
            .await?;
        info!(%batch_id, imported = records.len(), skipped = rows.len() - records.len(), "imported CSV batch");
        Ok(BulkOutcome {
            batch_id,
            written: records.len(),
        })
    }

    /// Join the must-succeed certificate writes with the best-effort ledger
    /// write: both are awaited, but only certificate failures abort the
    /// operation. Writes already committed when a sibling fails stay put.
    async fn write_batch(
        &self,
        batch_id: &str,
        kind: BatchKind,
        records: &[NewCertificate],
        description: &str,
    ) -> Result<(), OpError> {
        let cert_writes = try_join_all(
            records
                .iter()
                .map(|record| db::upsert_certificate(&self.pool, record)),
        );
        let ledger_write = self
            .ledger
            .record(batch_id, kind, records.len() as i64, description);

        let (written, ledger_res) = tokio::join!(cert_writes, ledger_write);
        written?;
        if let Err(err) = ledger_res {
            warn!(?err, %batch_id, "batch ledger write failed; certificates kept");
        }
        Ok(())
    }

    /// Undo a bulk operation: delete every certificate tagged with the batch
    /// ID plus the batch record itself, concurrently. Not atomic against the
    /// store; a partial failure is reported and leaves the rest in place.
    #[instrument(skip_all, fields(batch_id = %batch_id))]
    pub async fn undo_batch(&self, batch_id: &str) -> Result<usize, OpError> {
        let batch: Batch = self
            .ledger
            .get(batch_id)
            .await?
            .ok_or_else(|| OpError::not_found(format!("batch {batch_id}")))?;

        let tagged = db::list_by_batch(&self.pool, batch_id).await?;
        let cert_deletes = try_join_all(
            tagged
                .iter()
                .map(|cert| db::delete_certificate(&self.pool, &cert.id)),
        );
        let (cert_res, ledger_res) = tokio::join!(cert_deletes, self.ledger.delete(batch_id));
        cert_res?;
        ledger_res?;
        info!(%batch_id, kind = batch.kind.as_str(), deleted = tagged.len(), "batch undone");
        Ok(tagged.len())
    }

    /// Commit buffered inline edits: one concurrent partial update per
    /// certificate with pending fields. On failure, which rows succeeded is
    /// unknown; the caller re-fetches the listing either way.
    #[instrument(skip_all)]
    pub async fn commit_edits(&self, edits: EditBuffer) -> Result<usize, OpError> {
        let pending: Vec<(String, CertificatePatch)> = edits
            .into_pending()
            .into_iter()
            .filter(|(_, patch)| !patch.is_empty())
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }
        try_join_all(
            pending
                .iter()
                .map(|(id, patch)| db::update_certificate(&self.pool, id, patch)),
        )
        .await?;
        info!(updated = pending.len(), "committed inline edits");
        Ok(pending.len())
    }
}

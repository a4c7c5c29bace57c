use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of bulk operation a batch record describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    BatchGenerate,
    CsvUpload,
}

impl BatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchKind::BatchGenerate => "batch_generate",
            BatchKind::CsvUpload => "csv_upload",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "batch_generate" => Some(BatchKind::BatchGenerate),
            "csv_upload" => Some(BatchKind::CsvUpload),
            _ => None,
        }
    }
}

/// Ledger record of one bulk certificate-creation operation. Advisory only:
/// losing a batch record degrades undo discoverability, never certificate data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: String,
    pub kind: BatchKind,
    pub count: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A stored certificate. Keyed by the human-chosen certificate ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: String,
    /// Denormalized copy of `id`, kept for the printable view.
    pub cert_id: String,
    pub student_name: String,
    pub event: String,
    pub position: String,
    pub date: String,
    pub issued_by: String,
    /// True for batch-generated records awaiting a real student name.
    pub is_placeholder: bool,
    /// Present iff the record was created by a bulk operation.
    pub batch_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Field set for creating or fully replacing a certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCertificate {
    pub id: String,
    pub student_name: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub issued_by: String,
    #[serde(default)]
    pub is_placeholder: bool,
    #[serde(default)]
    pub batch_id: Option<String>,
}

/// Partial field set applied by `update`; unset fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificatePatch {
    pub student_name: Option<String>,
    pub event: Option<String>,
    pub position: Option<String>,
    pub date: Option<String>,
    pub issued_by: Option<String>,
}

impl CertificatePatch {
    pub fn is_empty(&self) -> bool {
        self.student_name.is_none()
            && self.event.is_none()
            && self.position.is_none()
            && self.date.is_none()
            && self.issued_by.is_none()
    }

    /// Merge `other` into `self`; fields set in `other` win.
    pub fn merge(&mut self, other: CertificatePatch) {
        if other.student_name.is_some() {
            self.student_name = other.student_name;
        }
        if other.event.is_some() {
            self.event = other.event;
        }
        if other.position.is_some() {
            self.position = other.position;
        }
        if other.date.is_some() {
            self.date = other.date;
        }
        if other.issued_by.is_some() {
            self.issued_by = other.issued_by;
        }
    }
}

/// Where an event surfaces: the homepage carousel or the archive page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Featured,
    Past,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Featured => "featured",
            EventType::Past => "past",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "featured" => Some(EventType::Featured),
            "past" => Some(EventType::Past),
            _ => None,
        }
    }
}

/// A society event shown on the listing pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    /// Free-text date range, e.g. "1 Dec - 8 Dec, 2025".
    pub date: String,
    pub location: String,
    pub category: String,
    pub description: String,
    pub tags: Vec<String>,
    pub link: String,
    /// External image URL; no binary handling.
    pub image: String,
    pub event_type: EventType,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Field set for creating or fully replacing an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub image: String,
    pub event_type: EventType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_merge_last_write_wins() {
        let mut patch = CertificatePatch {
            student_name: Some("Jane".into()),
            event: Some("Regatta".into()),
            ..Default::default()
        };
        patch.merge(CertificatePatch {
            student_name: Some("Janet".into()),
            position: Some("Winner".into()),
            ..Default::default()
        });
        assert_eq!(patch.student_name.as_deref(), Some("Janet"));
        assert_eq!(patch.event.as_deref(), Some("Regatta"));
        assert_eq!(patch.position.as_deref(), Some("Winner"));
        assert!(patch.date.is_none());
    }

    #[test]
    fn batch_kind_round_trip() {
        assert_eq!(BatchKind::parse("batch_generate"), Some(BatchKind::BatchGenerate));
        assert_eq!(BatchKind::parse("csv_upload"), Some(BatchKind::CsvUpload));
        assert_eq!(BatchKind::parse("other"), None);
        assert_eq!(BatchKind::CsvUpload.as_str(), "csv_upload");
    }
}

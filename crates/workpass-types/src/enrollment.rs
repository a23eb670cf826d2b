//! Enrollment domain types: submissions, directory records, receipts.

use serde::{Deserialize, Serialize};

use crate::transaction::TransactionSummary;

// ---------------------------------------------------------------------------
// Submission (what the applicant sends)
// ---------------------------------------------------------------------------

/// An applicant's employee-ID enrollment submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeSubmission {
    pub full_name: String,
    pub email: String,
    pub department: String,
    /// Branch office the employee reports to.
    pub branch: String,
    /// Raw ID photo bytes.
    #[serde(with = "serde_bytes_base64")]
    pub photo: Vec<u8>,
    /// Optional signature image. Absence is not an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "serde_opt_bytes_base64")]
    pub signature: Option<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// Directory record (what gets persisted)
// ---------------------------------------------------------------------------

/// The employee row inserted into the directory once assets are uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub full_name: String,
    pub email: String,
    pub department: String,
    pub branch: String,
    pub photo_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Receipt (what the applicant gets back)
// ---------------------------------------------------------------------------

/// Result of a committed enrollment workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentReceipt {
    pub employee_id: i64,
    pub photo_url: String,
    /// `None` when the signature upload was skipped or degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_url: Option<String>,
    /// Roster sheet row reference; `None` when the append degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roster_ref: Option<String>,
    pub transaction: TransactionSummary,
}

// ---------------------------------------------------------------------------
// AI headshot generation
// ---------------------------------------------------------------------------

/// Rendering style for AI-generated ID headshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadshotStyle {
    Formal,
    Business,
    Studio,
}

impl HeadshotStyle {
    /// Stable lowercase name, used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Formal => "formal",
            Self::Business => "business",
            Self::Studio => "studio",
        }
    }
}

impl std::fmt::Display for HeadshotStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request for an AI-generated headshot from a source photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadshotRequest {
    #[serde(with = "serde_bytes_base64")]
    pub photo: Vec<u8>,
    pub style: HeadshotStyle,
}

/// Result of a committed headshot workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadshotResult {
    pub source_url: String,
    pub headshot_url: String,
    pub transaction: TransactionSummary,
}

// ---------------------------------------------------------------------------
// Base64 byte-field serialization
// ---------------------------------------------------------------------------

/// Serialize photo/signature bytes as base64 strings so submissions stay
/// JSON-representable end to end.
mod serde_bytes_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

mod serde_opt_bytes_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| STANDARD.decode(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

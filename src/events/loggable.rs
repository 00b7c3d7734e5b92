use serde::{Deserialize, Serialize};

/// Severity levels for activity log entries; controls retention policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Long-term retention; RBAC changes land here.
    Critical,
    /// Default retention.
    #[default]
    Important,
    /// Aggressively trimmed.
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Entities whose mutations are recorded in the activity log.
pub trait Loggable: Serialize {
    fn entity_type() -> &'static str;
    fn subject_id(&self) -> String;
    fn severity(&self) -> Severity {
        Severity::Important
    }
}

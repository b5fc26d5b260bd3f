#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Interviewer,
    Candidate,
    System,
}

/// One utterance in the session transcript. Entries are append-only and
/// insertion-ordered; nothing is ever removed or reordered.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
}

impl TranscriptEntry {
    pub fn interviewer(content: impl Into<String>) -> Self {
        Self {
            role: Role::Interviewer,
            content: content.into(),
        }
    }

    pub fn candidate(content: impl Into<String>) -> Self {
        Self {
            role: Role::Candidate,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

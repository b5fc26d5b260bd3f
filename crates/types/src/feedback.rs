//! Feedback artifacts computed out-of-band by the backend.
//!
//! Both artifact kinds carry a completion marker (`overall_score` for a
//! roleplay session, `readiness_score` for a practice recording). A payload
//! without its marker means "still being computed", not an error.

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TopWin {
    pub point: String,
    pub example: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TopImprovement {
    pub point: String,
    pub suggestion: String,
}

/// Whole-session evaluation returned by the roleplay end/feedback endpoints.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionFeedback {
    pub db_session_id: String,
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub top_wins: Vec<TopWin>,
    #[serde(default)]
    pub top_improvements: Vec<TopImprovement>,
    #[serde(default)]
    pub delivery_notes: String,
    #[serde(default)]
    pub interview_ready: bool,
    #[serde(default)]
    pub total_turns: u32,
    #[serde(default)]
    pub duration_seconds: f64,
}

impl SessionFeedback {
    /// The score is the completion marker: absent means still computing.
    pub fn is_scored(&self) -> bool {
        self.overall_score.is_some()
    }
}

/// Per-recording delivery analysis for the practice flow.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecordingFeedback {
    pub readiness_score: Option<f64>,
    #[serde(default)]
    pub filler_word_count: u32,
    #[serde(default)]
    pub words_per_minute: f64,
    #[serde(default)]
    pub total_word_count: u32,
    #[serde(default)]
    pub pause_count: u32,
    #[serde(default)]
    pub star_score: Option<f64>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub coaching_tips: Vec<String>,
}

impl RecordingFeedback {
    pub fn is_scored(&self) -> bool {
        self.readiness_score.is_some()
    }
}

/// Response of `GET /feedback/{recording_id}`; `feedback` stays null while
/// the analysis is pending or processing.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FeedbackEnvelope {
    pub recording_id: String,
    pub status: String,
    pub feedback: Option<RecordingFeedback>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UploadResponse {
    pub recording_id: String,
    #[serde(default)]
    pub file_key: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionListItem {
    pub id: String,
    pub company: Option<String>,
    pub interview_type: Option<String>,
    pub status: String,
    pub overall_score: Option<f64>,
    pub total_turns: Option<u32>,
    pub started_at: String,
}

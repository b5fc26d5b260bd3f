use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use flowprep_types::feedback::{
    FeedbackEnvelope, RecordingFeedback, SessionFeedback, SessionListItem, UploadResponse,
};
use flowprep_types::session::{StartSessionRequest, StartSessionResponse};

// The `InterviewApi` trait is the contract for the backend collaborator:
// session creation and evaluation, plus the recording upload/analysis flow.
// The session controller only ever sees this abstraction, so tests can drive
// it with `mockall`'s `MockInterviewApi` instead of a live server.
//
// "Not ready yet" is modelled as `Ok(None)` on the feedback getters; it is a
// normal outcome during polling, not an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InterviewApi: Send + Sync {
    async fn start_session(&self, request: StartSessionRequest) -> Result<StartSessionResponse>;

    /// Ends the session and asks the backend to evaluate it. The returned
    /// feedback may still be unscored if the backend defers computation.
    async fn end_session(&self, db_session_id: &str) -> Result<SessionFeedback>;

    async fn session_feedback(&self, db_session_id: &str) -> Result<Option<SessionFeedback>>;

    async fn list_sessions(&self) -> Result<Vec<SessionListItem>>;

    async fn upload_recording(
        &self,
        wav: Vec<u8>,
        question_id: Option<String>,
        attempt_number: u32,
    ) -> Result<UploadResponse>;

    /// Kicks off async scoring for an uploaded recording.
    async fn request_analysis(&self, recording_id: &str) -> Result<()>;

    async fn recording_feedback(&self, recording_id: &str) -> Result<Option<RecordingFeedback>>;
}

pub struct BackendClient {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl BackendClient {
    pub fn new(base_url: &str, token: SecretString) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn bearer(&self) -> &str {
        self.token.expose_secret()
    }
}

#[async_trait]
impl InterviewApi for BackendClient {
    async fn start_session(&self, request: StartSessionRequest) -> Result<StartSessionResponse> {
        let response = self
            .client
            .post(format!("{}/roleplay/start", self.base_url))
            .bearer_auth(self.bearer())
            .json(&request)
            .send()
            .await
            .context("start-session request failed")?
            .error_for_status()
            .context("start-session rejected")?;
        Ok(response.json().await?)
    }

    async fn end_session(&self, db_session_id: &str) -> Result<SessionFeedback> {
        let response = self
            .client
            .post(format!(
                "{}/roleplay/session/{}/end",
                self.base_url, db_session_id
            ))
            .bearer_auth(self.bearer())
            .send()
            .await
            .context("end-session request failed")?
            .error_for_status()
            .context("end-session rejected")?;
        Ok(response.json().await?)
    }

    async fn session_feedback(&self, db_session_id: &str) -> Result<Option<SessionFeedback>> {
        let response = self
            .client
            .get(format!(
                "{}/roleplay/session/{}/feedback",
                self.base_url, db_session_id
            ))
            .bearer_auth(self.bearer())
            .send()
            .await
            .context("session-feedback request failed")?;
        // 404 means "not generated yet", which is expected while polling.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let feedback: SessionFeedback = response.error_for_status()?.json().await?;
        Ok(Some(feedback))
    }

    async fn list_sessions(&self) -> Result<Vec<SessionListItem>> {
        let response = self
            .client
            .get(format!("{}/roleplay/sessions", self.base_url))
            .bearer_auth(self.bearer())
            .send()
            .await
            .context("list-sessions request failed")?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn upload_recording(
        &self,
        wav: Vec<u8>,
        question_id: Option<String>,
        attempt_number: u32,
    ) -> Result<UploadResponse> {
        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("recording.wav")
            .mime_str("audio/wav")?;
        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("attempt_number", attempt_number.to_string());
        if let Some(question_id) = question_id {
            form = form.text("question_id", question_id);
        }
        let response = self
            .client
            .post(format!("{}/recordings/upload", self.base_url))
            .bearer_auth(self.bearer())
            .multipart(form)
            .send()
            .await
            .context("upload request failed")?
            .error_for_status()
            .context("upload rejected")?;
        Ok(response.json().await?)
    }

    async fn request_analysis(&self, recording_id: &str) -> Result<()> {
        self.client
            .post(format!("{}/feedback/analyze", self.base_url))
            .bearer_auth(self.bearer())
            .query(&[("recording_id", recording_id)])
            .send()
            .await
            .context("analyze request failed")?
            .error_for_status()
            .context("analyze rejected")?;
        Ok(())
    }

    async fn recording_feedback(&self, recording_id: &str) -> Result<Option<RecordingFeedback>> {
        let response = self
            .client
            .get(format!("{}/feedback/{}", self.base_url, recording_id))
            .bearer_auth(self.bearer())
            .send()
            .await
            .context("feedback request failed")?
            .error_for_status()?;
        let envelope: FeedbackEnvelope = response.json().await?;
        Ok(envelope.feedback)
    }
}

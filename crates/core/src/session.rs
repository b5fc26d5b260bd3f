use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use flowprep_realtime::Transport;
use flowprep_types::feedback::SessionFeedback;
use flowprep_types::session::{SessionConfig, StartSessionRequest};
use flowprep_types::{ClientMessage, ConnectionStatus, ServerMessage, TranscriptEntry};

use crate::api::InterviewApi;
use crate::poller::{CancelToken, PollOutcome, Poller};

/// Composed lifecycle of one interview run. `InSession` nests the
/// transport's own status; `Ending` and `Complete` are entered exactly once
/// no matter how termination was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    Starting,
    InSession,
    Ending,
    Complete,
}

/// What the session controller needs from the transport: a status signal,
/// fire-and-forget sends, and teardown. The live implementation is
/// [`flowprep_realtime::Transport`]; tests substitute a mock to verify that
/// guarded sends never reach the wire.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionWire: Send {
    fn status(&self) -> ConnectionStatus;
    async fn send(&mut self, message: ClientMessage);
    fn close(&mut self);
}

#[async_trait]
impl SessionWire for Transport {
    fn status(&self) -> ConnectionStatus {
        Transport::status(self)
    }

    async fn send(&mut self, message: ClientMessage) {
        Transport::send(self, message).await
    }

    fn close(&mut self) {
        Transport::close(self)
    }
}

/// Sink for the interviewer's spoken audio. Playback is best-effort: a
/// failure is swallowed, never surfaced as a session error.
pub trait SpeechPlayback: Send {
    fn play(&mut self, audio_b64: &str) -> Result<()>;
}

pub struct NoPlayback;

impl SpeechPlayback for NoPlayback {
    fn play(&mut self, _audio_b64: &str) -> Result<()> {
        Ok(())
    }
}

impl<P: SpeechPlayback + ?Sized> SpeechPlayback for Box<P> {
    fn play(&mut self, audio_b64: &str) -> Result<()> {
        (**self).play(audio_b64)
    }
}

/// Session-scoped state for one interview: ids, ordered transcript, and
/// turn counters. Owned by whoever runs the session loop and destroyed with
/// it; nothing here is process-wide.
pub struct InterviewSession {
    config: SessionConfig,
    phase: SessionPhase,
    session_id: Option<String>,
    db_session_id: Option<String>,
    transcript: Vec<TranscriptEntry>,
    current_turn: u32,
    max_turns: u32,
    feedback: Option<SessionFeedback>,
}

impl InterviewSession {
    pub fn new(config: SessionConfig) -> Self {
        let max_turns = StartSessionRequest::from(&config).max_turns;
        Self {
            config,
            phase: SessionPhase::NotStarted,
            session_id: None,
            db_session_id: None,
            transcript: Vec::new(),
            current_turn: 0,
            max_turns,
            feedback: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn current_turn(&self) -> u32 {
        self.current_turn
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn db_session_id(&self) -> Option<&str> {
        self.db_session_id.as_deref()
    }

    pub fn feedback(&self) -> Option<&SessionFeedback> {
        self.feedback.as_ref()
    }

    /// Creates the backend session and captures both identifiers. The
    /// `db_session_id` is set here exactly once and never changes. Returns
    /// the transport-level id for the caller to connect with.
    pub async fn start<A: InterviewApi + ?Sized>(&mut self, api: &A) -> Result<String> {
        if self.phase != SessionPhase::NotStarted {
            return Err(anyhow::anyhow!("session already started"));
        }
        let request = StartSessionRequest::from(&self.config);
        self.max_turns = request.max_turns;
        let response = api
            .start_session(request)
            .await
            .context("failed to create interview session")?;
        self.session_id = Some(response.session_id.clone());
        self.db_session_id = Some(response.db_session_id);
        self.phase = SessionPhase::Starting;
        Ok(response.session_id)
    }

    /// Called once the transport reports `Connected`.
    pub fn mark_connected(&mut self) {
        if self.phase == SessionPhase::Starting {
            self.phase = SessionPhase::InSession;
        }
    }

    /// Applies one inbound frame to the session state. Returns true when
    /// the frame finished the session. Unknown frames and pongs change
    /// nothing; the dispatcher stays alive whatever the server sends.
    pub fn apply<P: SpeechPlayback>(&mut self, message: ServerMessage, playback: &mut P) -> bool {
        match message {
            ServerMessage::Error { content } => {
                self.transcript.push(TranscriptEntry::system(content));
                false
            }
            ServerMessage::Pong | ServerMessage::Unknown => false,
            ServerMessage::Question(turn) | ServerMessage::FollowUp(turn) => {
                self.transcript
                    .push(TranscriptEntry::interviewer(turn.content));
                // Turn counters never go backwards within a session.
                self.current_turn = self.current_turn.max(turn.turn);
                self.max_turns = turn.max_turns.unwrap_or(self.max_turns);
                if let Some(audio_b64) = turn.audio_b64 {
                    if let Err(e) = playback.play(&audio_b64) {
                        tracing::debug!("interviewer audio playback failed: {e:#}");
                    }
                }
                false
            }
            ServerMessage::SessionEnd { content, audio_b64 } => {
                self.transcript.push(TranscriptEntry::interviewer(content));
                if let Some(audio_b64) = audio_b64 {
                    if let Err(e) = playback.play(&audio_b64) {
                        tracing::debug!("interviewer audio playback failed: {e:#}");
                    }
                }
                true
            }
        }
    }

    /// Submits a typed answer. The transcript entry and the wire send are
    /// guarded together: a blank answer or a transport that is not
    /// connected means no entry and no frame, so the transcript never shows
    /// an answer the interviewer could not have received.
    pub async fn submit_answer<W: SessionWire>(&mut self, content: &str, wire: &mut W) -> bool {
        let content = content.trim();
        if content.is_empty() || wire.status() != ConnectionStatus::Connected {
            return false;
        }
        self.transcript.push(TranscriptEntry::candidate(content));
        wire.send(ClientMessage::answer(content)).await;
        true
    }

    /// Ends the session and retrieves final feedback. Safe to call from
    /// any termination path; only the first call does anything, so a remote
    /// session_end racing a local end never issues two evaluation calls.
    pub async fn finish<A, W>(&mut self, api: &A, wire: &mut W) -> Result<Option<SessionFeedback>>
    where
        A: InterviewApi + ?Sized,
        W: SessionWire,
    {
        if matches!(self.phase, SessionPhase::Ending | SessionPhase::Complete) {
            return Ok(self.feedback.clone());
        }
        self.phase = SessionPhase::Ending;

        if wire.status() == ConnectionStatus::Connected {
            wire.send(ClientMessage::end_session()).await;
        }
        wire.close();

        let Some(db_session_id) = self.db_session_id.clone() else {
            // Never reached the backend; there is nothing to evaluate.
            self.phase = SessionPhase::Complete;
            return Ok(None);
        };

        let feedback = match api.end_session(&db_session_id).await {
            Ok(feedback) if feedback.is_scored() => Some(feedback),
            Ok(_) => {
                tracing::debug!("evaluation deferred, polling for feedback");
                poll_session_feedback(api, &db_session_id).await
            }
            Err(e) => {
                tracing::warn!("end-session call failed, polling for feedback: {e:#}");
                poll_session_feedback(api, &db_session_id).await
            }
        };

        self.feedback = feedback.clone();
        self.phase = SessionPhase::Complete;
        Ok(feedback)
    }
}

async fn poll_session_feedback<A: InterviewApi + ?Sized>(
    api: &A,
    db_session_id: &str,
) -> Option<SessionFeedback> {
    let outcome = Poller::default()
        .poll(CancelToken::never(), || async move {
            match api.session_feedback(db_session_id).await? {
                Some(feedback) if feedback.is_scored() => Ok(Some(feedback)),
                _ => Ok(None),
            }
        })
        .await;
    match outcome {
        PollOutcome::Ready(feedback) => Some(feedback),
        PollOutcome::Exhausted => {
            tracing::warn!("feedback polling exhausted, giving up");
            None
        }
        PollOutcome::Cancelled => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockInterviewApi;
    use flowprep_types::Role;
    use flowprep_types::message::InterviewerTurn;
    use flowprep_types::session::{InterviewType, StartSessionResponse};

    fn question(content: &str, turn: u32, max_turns: Option<u32>) -> ServerMessage {
        ServerMessage::Question(InterviewerTurn {
            content: content.to_string(),
            turn,
            max_turns,
            audio_b64: None,
            is_last: false,
        })
    }

    fn scored_feedback(db_session_id: &str) -> SessionFeedback {
        SessionFeedback {
            db_session_id: db_session_id.to_string(),
            overall_score: Some(82.0),
            summary: "Solid".to_string(),
            top_wins: vec![],
            top_improvements: vec![],
            delivery_notes: String::new(),
            interview_ready: true,
            total_turns: 5,
            duration_seconds: 400.0,
        }
    }

    fn unscored_feedback(db_session_id: &str) -> SessionFeedback {
        SessionFeedback {
            overall_score: None,
            ..scored_feedback(db_session_id)
        }
    }

    async fn started_session(api: &MockInterviewApi) -> InterviewSession {
        let mut session = InterviewSession::new(SessionConfig::default());
        session.start(api).await.unwrap();
        session
    }

    fn start_api() -> MockInterviewApi {
        let mut api = MockInterviewApi::new();
        api.expect_start_session().returning(|_| {
            Ok(StartSessionResponse {
                session_id: "ws-1".to_string(),
                db_session_id: "db-1".to_string(),
                message: String::new(),
            })
        });
        api
    }

    #[tokio::test]
    async fn start_sends_the_normalized_payload() {
        let mut api = MockInterviewApi::new();
        api.expect_start_session()
            .withf(|request| {
                request
                    == &StartSessionRequest {
                        company_key: "google".to_string(),
                        interview_type: InterviewType::Technical,
                        role: "Backend Engineer".to_string(),
                        max_turns: 5,
                    }
            })
            .times(1)
            .returning(|_| {
                Ok(StartSessionResponse {
                    session_id: "ws-1".to_string(),
                    db_session_id: "db-1".to_string(),
                    message: String::new(),
                })
            });

        let config = SessionConfig::builder()
            .with_company("Google")
            .with_interview_type(InterviewType::Technical)
            .with_role("Backend Engineer")
            .with_max_turns(5)
            .build();
        let mut session = InterviewSession::new(config);
        let session_id = session.start(&api).await.unwrap();

        assert_eq!(session_id, "ws-1");
        assert_eq!(session.db_session_id(), Some("db-1"));
        assert_eq!(session.phase(), SessionPhase::Starting);
        assert_eq!(session.max_turns(), 5);
    }

    #[tokio::test]
    async fn questions_append_entries_and_turns_never_decrease() {
        let api = start_api();
        let mut session = started_session(&api).await;
        let mut playback = NoPlayback;

        session.apply(question("Q1", 1, Some(5)), &mut playback);
        session.apply(question("Q2", 2, None), &mut playback);
        // A stale counter must not roll the turn back.
        session.apply(question("Q3", 1, None), &mut playback);

        assert_eq!(session.current_turn(), 2);
        assert_eq!(session.max_turns(), 5);
        assert_eq!(session.transcript().len(), 3);
        assert!(
            session
                .transcript()
                .iter()
                .all(|entry| entry.role == Role::Interviewer)
        );
    }

    #[tokio::test]
    async fn session_end_appends_one_entry_and_signals_completion() {
        let api = start_api();
        let mut session = started_session(&api).await;

        let over = session.apply(
            ServerMessage::SessionEnd {
                content: "Thanks!".to_string(),
                audio_b64: None,
            },
            &mut NoPlayback,
        );

        assert!(over);
        assert_eq!(
            session.transcript(),
            &[TranscriptEntry::interviewer("Thanks!")]
        );
    }

    #[tokio::test]
    async fn unknown_and_pong_frames_change_nothing() {
        let api = start_api();
        let mut session = started_session(&api).await;
        session.apply(question("Q1", 1, None), &mut NoPlayback);

        assert!(!session.apply(ServerMessage::Unknown, &mut NoPlayback));
        assert!(!session.apply(ServerMessage::Pong, &mut NoPlayback));

        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.current_turn(), 1);
    }

    #[tokio::test]
    async fn error_frames_become_system_entries_without_ending_the_session() {
        let api = start_api();
        let mut session = started_session(&api).await;

        let over = session.apply(
            ServerMessage::Error {
                content: "Please provide your answer.".to_string(),
            },
            &mut NoPlayback,
        );

        assert!(!over);
        assert_eq!(
            session.transcript(),
            &[TranscriptEntry::system("Please provide your answer.")]
        );
    }

    #[tokio::test]
    async fn playback_failure_is_swallowed() {
        struct FailingPlayback;
        impl SpeechPlayback for FailingPlayback {
            fn play(&mut self, _audio_b64: &str) -> Result<()> {
                Err(anyhow::anyhow!("no output device"))
            }
        }

        let api = start_api();
        let mut session = started_session(&api).await;
        let message = ServerMessage::Question(InterviewerTurn {
            content: "Q1".to_string(),
            turn: 1,
            max_turns: None,
            audio_b64: Some("AAAA".to_string()),
            is_last: false,
        });

        session.apply(message, &mut FailingPlayback);
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn answers_are_sent_and_recorded_while_connected() {
        let api = start_api();
        let mut session = started_session(&api).await;

        let mut wire = MockSessionWire::new();
        wire.expect_status()
            .return_const(ConnectionStatus::Connected);
        wire.expect_send()
            .withf(|message| {
                matches!(message, ClientMessage::Answer { content } if content == "My answer")
            })
            .times(1)
            .returning(|_| ());

        assert!(session.submit_answer("  My answer  ", &mut wire).await);
        assert_eq!(
            session.transcript(),
            &[TranscriptEntry::candidate("My answer")]
        );
    }

    #[tokio::test]
    async fn answers_while_disconnected_never_reach_wire_or_transcript() {
        let api = start_api();
        let mut session = started_session(&api).await;

        let mut wire = MockSessionWire::new();
        wire.expect_status().return_const(ConnectionStatus::Ended);
        wire.expect_send().never();

        assert!(!session.submit_answer("My answer", &mut wire).await);
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn blank_answers_are_rejected_locally() {
        let api = start_api();
        let mut session = started_session(&api).await;

        let mut wire = MockSessionWire::new();
        wire.expect_status()
            .return_const(ConnectionStatus::Connected);
        wire.expect_send().never();

        assert!(!session.submit_answer("   ", &mut wire).await);
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn finish_evaluates_once_no_matter_how_often_it_is_called() {
        let mut api = start_api();
        api.expect_end_session()
            .times(1)
            .returning(|db_session_id| Ok(scored_feedback(db_session_id)));

        let mut session = started_session(&api).await;
        let mut wire = MockSessionWire::new();
        wire.expect_status().return_const(ConnectionStatus::Ended);
        wire.expect_close().returning(|| ());

        let first = session.finish(&api, &mut wire).await.unwrap();
        assert_eq!(first.unwrap().overall_score, Some(82.0));
        assert_eq!(session.phase(), SessionPhase::Complete);

        // A remote session_end racing a local end must not evaluate twice.
        let second = session.finish(&api, &mut wire).await.unwrap();
        assert_eq!(second.unwrap().overall_score, Some(82.0));
    }

    #[tokio::test]
    async fn finish_sends_the_end_frame_while_connected() {
        let mut api = start_api();
        api.expect_end_session()
            .returning(|db_session_id| Ok(scored_feedback(db_session_id)));

        let mut session = started_session(&api).await;
        let mut wire = MockSessionWire::new();
        wire.expect_status()
            .return_const(ConnectionStatus::Connected);
        wire.expect_send()
            .withf(|message| matches!(message, ClientMessage::EndSession { .. }))
            .times(1)
            .returning(|_| ());
        wire.expect_close().times(1).returning(|| ());

        session.finish(&api, &mut wire).await.unwrap();
    }

    #[tokio::test]
    async fn deferred_evaluation_falls_back_to_polling() {
        let mut api = start_api();
        api.expect_end_session()
            .returning(|db_session_id| Ok(unscored_feedback(db_session_id)));
        api.expect_session_feedback()
            .times(1)
            .returning(|db_session_id| Ok(Some(scored_feedback(db_session_id))));

        let mut session = started_session(&api).await;
        let mut wire = MockSessionWire::new();
        wire.expect_status().return_const(ConnectionStatus::Ended);
        wire.expect_close().returning(|| ());

        let feedback = session.finish(&api, &mut wire).await.unwrap();
        assert_eq!(feedback.unwrap().overall_score, Some(82.0));
    }
}

use crate::Base64EncodedAudioBytes;

/// Frames the client writes to the interview socket.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "answer")]
    Answer { content: String },
    #[serde(rename = "end_session")]
    EndSession { content: String },
    #[serde(rename = "ping")]
    Ping { content: String },
}

impl ClientMessage {
    pub fn answer(content: impl Into<String>) -> Self {
        Self::Answer {
            content: content.into(),
        }
    }

    pub fn end_session() -> Self {
        Self::EndSession {
            content: String::new(),
        }
    }

    pub fn ping() -> Self {
        Self::Ping {
            content: String::new(),
        }
    }
}

/// One interviewer utterance carrying the turn counters.
///
/// `max_turns` is optional on the wire; the session keeps its previous
/// value when the field is absent.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InterviewerTurn {
    pub content: String,
    #[serde(default)]
    pub turn: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_b64: Option<Base64EncodedAudioBytes>,
    #[serde(default)]
    pub is_last: bool,
}

/// Frames the server writes to the client.
///
/// Unrecognized `type` discriminators deserialize to `Unknown` so a newer
/// server never crashes the dispatcher.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "question")]
    Question(InterviewerTurn),
    #[serde(rename = "follow_up")]
    FollowUp(InterviewerTurn),
    #[serde(rename = "session_end")]
    SessionEnd {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio_b64: Option<Base64EncodedAudioBytes>,
    },
    #[serde(rename = "error")]
    Error { content: String },
    #[serde(rename = "pong")]
    Pong,
    #[serde(other)]
    Unknown,
}

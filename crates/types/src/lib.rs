pub mod feedback;
pub mod message;
pub mod session;
pub mod status;
pub mod transcript;

pub use message::{ClientMessage, InterviewerTurn, ServerMessage};
pub use status::ConnectionStatus;
pub use transcript::{Role, TranscriptEntry};

/// Audio data encoded as base64 (PCM16, little-endian).
pub type Base64EncodedAudioBytes = String;

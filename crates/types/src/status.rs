/// Lifecycle of one interview connection.
///
/// The only forward path is Idle -> Connecting -> Connected; any state may
/// move directly to Ended. Ended is terminal and is never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Connected,
    Ended,
}

impl ConnectionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionStatus::Ended)
    }
}

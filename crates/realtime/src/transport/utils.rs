use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use crate::transport::config::TransportConfig;
use crate::transport::consts::AUTHORIZATION_HEADER;

/// Builds the handshake request for one session's socket. The endpoint is
/// derived deterministically from the session id.
pub fn build_request(
    config: &TransportConfig,
    session_id: &str,
) -> tokio_tungstenite::tungstenite::Result<Request> {
    let mut request = format!(
        "{}/roleplay/session/{}",
        config.ws_base_url(),
        session_id
    )
    .into_client_request()?;
    if let Some(token) = config.bearer_token() {
        request.headers_mut().insert(
            AUTHORIZATION_HEADER,
            format!("Bearer {}", token.expose_secret()).as_str().parse()?,
        );
    }
    Ok(request)
}

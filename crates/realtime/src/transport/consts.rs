pub const DEFAULT_WS_BASE_URL: &str = "ws://localhost:8000";

pub const AUTHORIZATION_HEADER: &str = "Authorization";

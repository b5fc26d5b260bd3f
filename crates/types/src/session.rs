pub const DEFAULT_ROLE: &str = "Software Engineer";
pub const DEFAULT_MAX_TURNS: u32 = 8;
pub const DEFAULT_COMPANY_KEY: &str = "generic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewType {
    #[default]
    Behavioral,
    Technical,
    Mixed,
}

/// Caller-facing interview setup. Normalized into a [`StartSessionRequest`]
/// before it reaches the backend.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    company: Option<String>,
    interview_type: InterviewType,
    role: Option<String>,
    max_turns: Option<u32>,
}

impl SessionConfig {
    pub fn builder() -> SessionConfigurator {
        SessionConfigurator {
            config: SessionConfig::default(),
        }
    }
}

pub struct SessionConfigurator {
    config: SessionConfig,
}

impl SessionConfigurator {
    pub fn with_company(mut self, company: &str) -> Self {
        self.config.company = Some(company.to_string());
        self
    }

    pub fn with_interview_type(mut self, interview_type: InterviewType) -> Self {
        self.config.interview_type = interview_type;
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.config.role = Some(role.to_string());
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.config.max_turns = Some(max_turns);
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}

/// Payload for `POST /roleplay/start`, with the backend's defaults applied.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StartSessionRequest {
    pub company_key: String,
    pub interview_type: InterviewType,
    pub role: String,
    pub max_turns: u32,
}

impl From<&SessionConfig> for StartSessionRequest {
    fn from(config: &SessionConfig) -> Self {
        Self {
            company_key: config
                .company
                .as_deref()
                .map(str::to_lowercase)
                .unwrap_or_else(|| DEFAULT_COMPANY_KEY.to_string()),
            interview_type: config.interview_type,
            role: config
                .role
                .clone()
                .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            max_turns: config.max_turns.unwrap_or(DEFAULT_MAX_TURNS),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub db_session_id: String,
    #[serde(default)]
    pub message: String,
}

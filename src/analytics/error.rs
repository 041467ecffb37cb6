use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalyticsErrorCode {
    InvalidConfiguration,
    ScriptInjection,
    ScriptLoadFailed,
    ScriptLoadTimeout,
    Dispatch,
    Network,
}

impl AnalyticsErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsErrorCode::InvalidConfiguration => "analytics/invalid-configuration",
            AnalyticsErrorCode::ScriptInjection => "analytics/script-injection",
            AnalyticsErrorCode::ScriptLoadFailed => "analytics/script-load-failed",
            AnalyticsErrorCode::ScriptLoadTimeout => "analytics/script-load-timeout",
            AnalyticsErrorCode::Dispatch => "analytics/dispatch",
            AnalyticsErrorCode::Network => "analytics/network",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalyticsError {
    pub code: AnalyticsErrorCode,
    message: String,
}

impl AnalyticsError {
    pub fn new(code: AnalyticsErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for AnalyticsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for AnalyticsError {}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

pub fn invalid_configuration(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::InvalidConfiguration, message)
}

pub fn script_injection(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::ScriptInjection, message)
}

pub fn script_load_failed(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::ScriptLoadFailed, message)
}

pub fn script_load_timeout(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::ScriptLoadTimeout, message)
}

pub fn dispatch_error(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::Dispatch, message)
}

pub fn network_error(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::Network, message)
}

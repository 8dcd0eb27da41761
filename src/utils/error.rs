use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Markup did not match the expected layout: {message}")]
    Parse { message: String },

    #[error("error accessing resource {label}: {source}")]
    Fetch {
        label: String,
        #[source]
        source: Box<StatsError>,
    },

    #[error("Cache unavailable: {reason}")]
    CacheUnavailable { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidation { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, StatsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Markup,
    Cache,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl StatsError {
    pub fn parse(message: impl Into<String>) -> Self {
        StatsError::Parse {
            message: message.into(),
        }
    }

    pub fn fetch(label: impl Into<String>, cause: StatsError) -> Self {
        StatsError::Fetch {
            label: label.into(),
            source: Box::new(cause),
        }
    }

    /// 只有傳輸層失敗值得重試；已收到的錯誤標記重抓也不會變
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StatsError::Http(_) | StatsError::HttpStatus { .. } | StatsError::Io(_)
        )
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, StatsError::Fetch { .. })
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StatsError::Http(_) | StatsError::HttpStatus { .. } | StatsError::Fetch { .. } => {
                ErrorCategory::Network
            }
            StatsError::Parse { .. } => ErrorCategory::Markup,
            StatsError::CacheUnavailable { .. } | StatsError::Serialization(_) => {
                ErrorCategory::Cache
            }
            StatsError::ConfigValidation { .. } | StatsError::InvalidConfigValue { .. } => {
                ErrorCategory::Configuration
            }
            StatsError::Io(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Markup | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Cache | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check the network connection and that the session cookie is still valid"
            }
            ErrorCategory::Markup => {
                "The marketplace page layout changed; the row grammar needs updating"
            }
            ErrorCategory::Cache => "Delete the cache file with --clear-cache and run again",
            ErrorCategory::Configuration => "Fix the configuration value and run again",
            ErrorCategory::System => "Check file permissions and free disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            StatsError::Fetch { label, .. } => {
                format!("Could not download '{}' and no cached data is available", label)
            }
            StatsError::Parse { .. } => format!("Unexpected page layout ({})", self),
            _ => self.to_string(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

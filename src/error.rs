use thiserror::Error;

/// Outcomes of the composite score that have no numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("follower count is unknown")]
    MissingFollowerCount,
    #[error("engagement ratio is undefined for a creator with zero followers")]
    UndefinedRatio,
}

/// Failures reported by the external services (scrapers, Sheets, Drive).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("{service} request failed: {message}")]
    Transport { service: &'static str, message: String },
    #[error("{service} error {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{service} response parse failed: {message}")]
    Parse { service: &'static str, message: String },
    #[error("{0} not found")]
    NotFound(String),
    #[error("sheet '{0}' not found")]
    SheetNotFound(String),
    #[error("{0}")]
    Config(String),
}

impl CollaboratorError {
    pub fn transport(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            service,
            message: err.to_string(),
        }
    }

    pub fn parse(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            service,
            message: err.to_string(),
        }
    }

    pub fn upstream(service: &'static str, status: u16, body: &str) -> Self {
        Self::Upstream {
            service,
            status,
            body: body.trim().to_string(),
        }
    }
}

/// Workflow-level failures. The HTTP layer maps each kind to a status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{context}: {source}")]
    Upstream {
        context: String,
        #[source]
        source: CollaboratorError,
    },
    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: CollaboratorError,
    },
    #[error("{0}")]
    NotConfigured(String),
}

impl WorkflowError {
    pub fn upstream(context: impl Into<String>, source: CollaboratorError) -> Self {
        Self::Upstream {
            context: context.into(),
            source,
        }
    }

    /// Spreadsheet and Drive failures; `NotFound` keeps its own kind.
    pub fn storage(context: impl Into<String>, source: CollaboratorError) -> Self {
        match source {
            CollaboratorError::NotFound(what) => Self::NotFound(format!("{} not found", what)),
            CollaboratorError::SheetNotFound(name) => {
                Self::NotFound(format!("sheet '{}' not found", name))
            }
            CollaboratorError::Config(message) => Self::NotConfigured(message),
            source => Self::Storage {
                context: context.into(),
                source,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

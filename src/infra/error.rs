use thiserror::Error;

/// Startup and adapter failures outside the request path.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("entity store error: {message}")]
    Database { message: String },
    #[error("speed cache error: {message}")]
    Cache { message: String },
    #[error("event transport error: {message}")]
    Events { message: String },
    #[error("telemetry initialization failed: {message}")]
    Telemetry { message: String },
    #[error("configuration error: {message}")]
    Configuration { message: String },
    #[error("http server error: {message}")]
    Server { message: String },
}

impl InfraError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn events(message: impl Into<String>) -> Self {
        Self::Events {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for InfraError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(err.to_string())
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotionvidError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Protocol violation: {details}")]
    ProtocolViolation { details: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("System error: {message}")]
    System { message: String },
}

/// Failures reported by the camera/encoder collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Frame capture failed: {details}")]
    Capture { details: String },

    #[error("Encode submission failed: {details}")]
    Encode { details: String },

    #[error("Failed to stop camera: {details}")]
    StopCamera { details: String },

    #[error("Failed to start camera: {details}")]
    StartCamera { details: String },

    #[error("Pipeline teardown failed: {details}")]
    Teardown { details: String },

    #[error("Failed to reconfigure pipeline for {destination}: {details}")]
    Reconfigure { destination: String, details: String },

    #[error("Failed to stop encoder: {details}")]
    StopEncoder { details: String },
}

impl MotionvidError {
    pub fn invalid_config<S: Into<String>>(details: S) -> Self {
        Self::InvalidConfig {
            details: details.into(),
        }
    }

    pub fn protocol_violation<S: Into<String>>(details: S) -> Self {
        Self::ProtocolViolation {
            details: details.into(),
        }
    }

    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Short, stable label for the error family
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::InvalidConfig { .. } => "configuration",
            Self::Pipeline(_) => "pipeline",
            Self::ProtocolViolation { .. } => "protocol_violation",
            Self::Io(_) => "io",
            Self::Serialization(_) | Self::Metadata(_) => "serialization",
            Self::System { .. } => "system",
        }
    }
}

pub type Result<T> = std::result::Result<T, MotionvidError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            MotionvidError::invalid_config("block_size").kind(),
            "configuration"
        );
        assert_eq!(
            MotionvidError::protocol_violation("empty").kind(),
            "protocol_violation"
        );
        let pipeline: MotionvidError = PipelineError::StartCamera {
            details: "busy".to_string(),
        }
        .into();
        assert_eq!(pipeline.kind(), "pipeline");
        assert!(pipeline.to_string().contains("busy"));
    }
}

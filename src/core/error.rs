//! Error types for the logging pipeline

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON configuration error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Backup renumbering failed for a path
    #[error("File rollover failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// A configured sink could not be constructed
    #[error("Sink '{sink}' failed to initialize: {message}")]
    SinkInit { sink: String, message: String },

    /// A sink name with no registered constructor
    #[error("Unknown sink '{0}'")]
    UnknownSink(String),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// The dispatcher queue has no consumer any more
    #[error("Dispatcher queue disconnected")]
    QueueDisconnected,

    /// The queue was full and the dispatcher could not wait for room
    #[error("Dispatcher queue full while not running")]
    QueueFull,

    /// The dispatcher no longer accepts records
    #[error("Dispatcher already stopped")]
    DispatcherStopped,

    /// A fault surfaced because the error mode is `exception`
    #[error("{0}")]
    Escalated(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a file rollover error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a sink construction error
    pub fn sink_init(sink: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::SinkInit {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LoggerError::sink_init("logfile", "permission denied");
        assert!(matches!(err, LoggerError::SinkInit { .. }));

        let err = LoggerError::config("RotatingFileSink", "bad size");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = LoggerError::file_rotation("/var/log/app003.log", "Disk full");
        assert_eq!(
            err.to_string(),
            "File rollover failed for '/var/log/app003.log': Disk full"
        );

        let err = LoggerError::DispatcherStopped;
        assert_eq!(err.to_string(), "Dispatcher already stopped");

        let err = LoggerError::UnknownSink("syslog".to_string());
        assert_eq!(err.to_string(), "Unknown sink 'syslog'");

        let err = LoggerError::sink_init("logfile", "read-only directory");
        assert_eq!(
            err.to_string(),
            "Sink 'logfile' failed to initialize: read-only directory"
        );
    }

    #[test]
    fn test_io_operation_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = LoggerError::io_operation("renaming backup", "cannot rename file", io_err);

        assert!(matches!(err, LoggerError::IoOperation { .. }));
        assert!(err.to_string().contains("renaming backup"));
        assert!(std::error::Error::source(&err).is_some());
    }
}

use thiserror::Error;

use crate::model::OperationKind;

pub type Result<T> = std::result::Result<T, AppError>;

/// Everything that can go wrong inside a worker or while loading config.
///
/// Workers never propagate these past their own boundary: they are rendered
/// with `Display` into a status/log line for the UI.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("search API returned {status}: {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("yt-dlp exited with {code}: {stderr}")]
    Process { code: String, stderr: String },
    #[error("invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("could not write config file: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
    #[error("no API key configured")]
    MissingApiKey,
    #[error("no results found")]
    NoResults,
    #[error("no entries found in playlist")]
    NoEntries,
    #[error("no videos selected")]
    NothingSelected,
    #[error("please enter {0}")]
    EmptyInput(&'static str),
    #[error("{0} is already running")]
    Busy(OperationKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_error_mentions_stderr() {
        let err = AppError::Process {
            code: "exit status: 1".into(),
            stderr: "ERROR: Video unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "yt-dlp exited with exit status: 1: ERROR: Video unavailable"
        );
    }

    #[test]
    fn busy_names_the_operation() {
        assert_eq!(
            AppError::Busy(OperationKind::Search).to_string(),
            "search is already running"
        );
    }
}

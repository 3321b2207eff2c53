use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The directory watch could not be established or its event stream died.
    #[error("cannot watch {path}: {reason}")]
    Watch { path: PathBuf, reason: String },

    /// A data line did not tokenize into a record.
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },

    /// A logical line was not valid UTF-8.
    #[error("line {line} is not valid utf-8: {source}")]
    Decode {
        line: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("publish to `{topic}` failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("stage `{stage}` error: {message}")]
    Stage {
        stage: &'static str,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("pipeline error: {context}")]
    Pipeline { context: &'static str },

    #[error("config error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn pipeline(context: &'static str) -> Self {
        Self::Pipeline { context }
    }

    pub fn stage(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error with the name of the stage it escaped from.
    pub fn stage_source(stage: &'static str, source: Error) -> Self {
        Self::Stage {
            stage,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }

    pub fn watch(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Watch {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn publish(topic: impl Into<String>, reason: impl ToString) -> Self {
        Self::Publish {
            topic: topic.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_malformed_record(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }

    /// True when the error (or the error a stage wrapped) is a decode failure.
    pub fn is_decode(&self) -> bool {
        match self {
            Self::Decode { .. } => true,
            Self::Stage {
                source: Some(inner),
                ..
            } => inner.is_decode(),
            _ => false,
        }
    }
}

//! Layered settings: defaults, then an optional TOML file, then environment.
//!
//! Environment variables are prefixed with `ROWPIPE_` and use a double
//! underscore between levels:
//! - `ROWPIPE_WATCH__DIRECTORY=/srv/inbox` sets `watch.directory`
//! - `ROWPIPE_CHANNEL__TOPIC=todo-topic` sets `channel.topic`
//! - `ROWPIPE_INGEST__MAX_IN_FLIGHT=16` sets `ingest.max_in_flight`
//!
//! Settings are read once at startup and never change afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::error::Result;
use crate::ingest::FileIngestor;
use crate::publish::{RecordPublisher, DEFAULT_MAX_IN_FLIGHT};
use crate::source::chunks::DEFAULT_CHUNK_BYTES;
use crate::watch::DirectoryWatcher;

pub const ENV_PREFIX: &str = "ROWPIPE_";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub watch: WatchSettings,
    #[serde(default)]
    pub channel: ChannelSettings,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WatchSettings {
    /// Directory whose new files are ingested
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Queue size between the OS watcher and the watch loop
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChannelSettings {
    /// Topic every record is published to
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Where the file channel spools topics
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IngestSettings {
    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,
    #[serde(default = "default_buffer")]
    pub buffer: usize,
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Drop blank lines instead of rejecting them as malformed
    #[serde(default)]
    pub allow_empty_lines: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `rowpipe=debug`
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_directory() -> PathBuf {
    PathBuf::from("./inbox")
}

fn default_event_buffer() -> usize {
    256
}

fn default_topic() -> String {
    "todo-topic".to_string()
}

fn default_spool_dir() -> PathBuf {
    PathBuf::from("./spool")
}

fn default_chunk_bytes() -> usize {
    DEFAULT_CHUNK_BYTES
}

fn default_buffer() -> usize {
    64
}

fn default_max_line_bytes() -> usize {
    1024 * 1024
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            spool_dir: default_spool_dir(),
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            chunk_bytes: default_chunk_bytes(),
            buffer: default_buffer(),
            max_line_bytes: default_max_line_bytes(),
            max_in_flight: default_max_in_flight(),
            allow_empty_lines: false,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl Settings {
    /// Load defaults, then `path` if given and present, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        let settings = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        Ok(settings)
    }

    pub fn publisher(&self, channel: Arc<dyn Channel>) -> RecordPublisher {
        RecordPublisher::new(channel, self.channel.topic.as_str())
            .max_in_flight(self.ingest.max_in_flight)
    }

    pub fn ingestor(&self, publisher: RecordPublisher) -> FileIngestor {
        FileIngestor::new(publisher)
            .chunk_bytes(self.ingest.chunk_bytes)
            .buffer(self.ingest.buffer)
            .max_line_bytes(self.ingest.max_line_bytes)
            .allow_empty_lines(self.ingest.allow_empty_lines)
    }

    pub fn watcher(&self, ingestor: FileIngestor) -> DirectoryWatcher {
        DirectoryWatcher::new(&self.watch.directory, ingestor)
            .event_buffer(self.watch.event_buffer)
    }
}

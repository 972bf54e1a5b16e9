use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("{0} unavailable: {1}")]
    Unavailable(&'static str, String),
    #[error("no {0} file configured")]
    NotConfigured(&'static str),
    #[error("could not decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("could not open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image has zero width or height")]
    Empty,
    #[error("live feed ended before delivering a frame")]
    FeedEnded,
}

#[derive(thiserror::Error, Debug)]
pub enum MidiError {
    #[error("midi init failed: {0}")]
    Init(String),
    #[error("midi input '{0}' not found")]
    NotFound(String),
    #[error("midi connect failed: {0}")]
    Connect(String),
}

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("could not read settings {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

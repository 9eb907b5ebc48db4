use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("File access error on {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scheduling error: {0}")]
    Scheduling(String),
}

impl SweepError {
    /// Wrap an I/O error raised while touching `path`.
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }
}

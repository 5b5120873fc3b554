#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("source not found: {0}")]
    NotFound(String),
    #[error("unsupported source scheme: {0}")]
    UnsupportedScheme(String),
    #[error("io error: {0}")]
    Io(String),
}

/// Narrow seam to the outside world: "fetch raw bytes of a MIDI file given
/// a source reference". A reference is a plain path or a file:// URL; remote
/// schemes live behind the same trait.
pub trait SourcePort: Send + Sync {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, SourceError>;
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("xml error: {0}")]
    XmlError(String),
    #[error("unsupported source")]
    UnsupportedSource,
    #[error("upstream rejected request: {0}")]
    UpstreamRejected(String),
    #[error("other: {0}")]
    Other(String),
}

impl From<quick_xml::Error> for SourceError {
    fn from(e: quick_xml::Error) -> Self {
        SourceError::XmlError(e.to_string())
    }
}

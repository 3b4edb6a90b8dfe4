use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad tolerance, duplicate priority entry, etc.).
    ConfigValidation(String),
    /// A config section references a field the engine does not resolve.
    UnknownField(String),
    /// A source name outside valuation / listing / assessor.
    UnknownSource(String),
    /// A raw source record could not be decoded.
    RecordParse { source: String, message: String },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::UnknownField(field) => write!(f, "unknown field: {field}"),
            Self::UnknownSource(source) => write!(f, "unknown source: {source}"),
            Self::RecordParse { source, message } => {
                write!(f, "source '{source}': cannot parse record: {message}")
            }
        }
    }
}

impl std::error::Error for ReconError {}

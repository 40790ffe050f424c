use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum MiError {
    /// A FASTA record could not be parsed
    Record {
        /// 1-based record number where parsing stopped
        record: usize,
        /// A human-readable message explaining the error
        message: String,
    },
    /// A line of a text table could not be parsed
    Parse {
        /// 1-based line number
        line: usize,
        message: String,
    },
    /// No sequence was supplied, or none survived the length check
    EmptyAlignment,
    /// Every sequence exceeded the gap threshold
    NoSequences { gap_threshold: f64 },
    /// Every column exceeded the gap threshold
    NoColumns { gap_threshold: f64 },
    /// A parameter is outside its allowed range
    InvalidParams(String),
    /// The time budget ran out during `stage`
    Timeout { stage: &'static str, seconds: f64 },
    /// Underlying reader failure
    Io(String),
}

impl fmt::Display for MiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiError::Record { record, message } => {
                write!(f, "Parse error at record {}: {}", record, message)
            }
            MiError::Parse { line, message } => {
                write!(f, "Parse error at line {}: {}", line, message)
            }
            MiError::EmptyAlignment => write!(f, "Alignment contains no sequences"),
            MiError::NoSequences { gap_threshold } => write!(
                f,
                "No sequences left after gap filtering (gap threshold {})",
                gap_threshold
            ),
            MiError::NoColumns { gap_threshold } => write!(
                f,
                "No columns left after gap filtering (gap threshold {})",
                gap_threshold
            ),
            MiError::InvalidParams(msg) => write!(f, "Invalid parameters: {}", msg),
            MiError::Timeout { stage, seconds } => {
                write!(f, "Timed out during {} after {:.1}s", stage, seconds)
            }
            MiError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for MiError {}

impl From<std::io::Error> for MiError {
    fn from(err: std::io::Error) -> Self {
        MiError::Io(err.to_string())
    }
}

//! Load-time error taxonomy.
//!
//! Three families abort a load before any graph exists:
//!
//! - [`InputError`]: the caller handed us something we will not try to read
//!   (empty buffer, wrong extension, empty archive).
//! - [`FormatError`]: the bytes were read but are not a usable workbook
//!   (malformed XML, missing `workbook` root, no `.twb` member).
//! - [`LoadError::ResourceLimit`]: the buffer exceeds the configured maximum.
//!
//! Data-quality problems inside an otherwise valid workbook are never errors;
//! see [`crate::diagnostics`].

use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    EmptyInput,
    UnsupportedExtension,
    EmptyArchive,
    MalformedXml,
    MissingWorkbookRoot,
    MissingWorkbookMember,
    UnreadableArchive,
    InvalidEncoding,
    FileTooLarge,
    ConfigParseError,
    NodeNotFound,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::EmptyInput => "E1001",
            Self::UnsupportedExtension => "E1002",
            Self::EmptyArchive => "E1003",
            Self::MalformedXml => "E2001",
            Self::MissingWorkbookRoot => "E2002",
            Self::MissingWorkbookMember => "E2003",
            Self::UnreadableArchive => "E2004",
            Self::InvalidEncoding => "E2005",
            Self::FileTooLarge => "E3001",
            Self::ConfigParseError => "E4001",
            Self::NodeNotFound => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::EmptyInput => "Input file is empty",
            Self::UnsupportedExtension => "Unsupported file extension",
            Self::EmptyArchive => "Workbook archive is empty",
            Self::MalformedXml => "Workbook markup is not well-formed",
            Self::MissingWorkbookRoot => "Workbook root element missing",
            Self::MissingWorkbookMember => "No workbook found inside archive",
            Self::UnreadableArchive => "Workbook archive could not be read",
            Self::InvalidEncoding => "Workbook markup is not valid UTF-8",
            Self::FileTooLarge => "File exceeds maximum size",
            Self::ConfigParseError => "Config file parse error",
            Self::NodeNotFound => "Node not found",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::EmptyInput | Self::EmptyArchive => Some("Select a non-empty .twb or .twbx file."),
            Self::UnsupportedExtension => Some("Only .twb and .twbx files are supported."),
            Self::MalformedXml | Self::MissingWorkbookRoot | Self::InvalidEncoding => {
                Some("Re-save the workbook from Tableau and retry.")
            }
            Self::MissingWorkbookMember | Self::UnreadableArchive => {
                Some("Make sure the .twbx was packaged by Tableau and contains a .twb file.")
            }
            Self::FileTooLarge => Some("Raise `limits.max_file_bytes` in twbgraph.toml."),
            Self::ConfigParseError => Some("Fix syntax in twbgraph.toml and retry."),
            Self::NodeNotFound => Some("Use `twbg search` to find the node id."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Rejections that happen before any byte is interpreted as markup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("input file '{0}' is empty")]
    Empty(String),

    #[error("unsupported file extension for '{0}' (expected .twb or .twbx)")]
    UnsupportedExtension(String),

    #[error("workbook archive '{0}' contains no entries")]
    EmptyArchive(String),
}

/// The input was read but is not a usable workbook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("malformed workbook XML: {0}")]
    MalformedXml(String),

    #[error("document root is <{0}>, expected <workbook>")]
    MissingWorkbookRoot(String),

    #[error("no .twb workbook found inside archive '{0}'")]
    MissingWorkbookMember(String),

    #[error("unreadable workbook archive: {0}")]
    UnreadableArchive(String),

    #[error("workbook markup is not valid UTF-8: {0}")]
    InvalidEncoding(String),
}

/// Everything that can abort a workbook load.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("file is {size} bytes, exceeding the {max} byte limit")]
    ResourceLimit { size: u64, max: u64 },
}

impl InputError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Empty(_) => ErrorCode::EmptyInput,
            Self::UnsupportedExtension(_) => ErrorCode::UnsupportedExtension,
            Self::EmptyArchive(_) => ErrorCode::EmptyArchive,
        }
    }
}

impl FormatError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MalformedXml(_) => ErrorCode::MalformedXml,
            Self::MissingWorkbookRoot(_) => ErrorCode::MissingWorkbookRoot,
            Self::MissingWorkbookMember(_) => ErrorCode::MissingWorkbookMember,
            Self::UnreadableArchive(_) => ErrorCode::UnreadableArchive,
            Self::InvalidEncoding(_) => ErrorCode::InvalidEncoding,
        }
    }
}

impl LoadError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Input(err) => err.code(),
            Self::Format(err) => err.code(),
            Self::ResourceLimit { .. } => ErrorCode::FileTooLarge,
        }
    }
}

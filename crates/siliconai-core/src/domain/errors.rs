use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ValidatorResult<T> = Result<T, ValidatorError>;

/// Failure classes of the pipeline. The process exit status is derived from
/// the class so that batch drivers can tell bad inputs from broken shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    SchemaMismatch,
    IndexStructure,
    QuantizationOverflow,
    GeometryLookup,
    IoSystem,
    Internal,
}

impl ErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::SchemaMismatch | Self::IndexStructure => 2,
            Self::IoSystem => 3,
            Self::QuantizationOverflow | Self::GeometryLookup => 4,
            Self::Internal => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SchemaMismatch => "SchemaMismatch",
            Self::IndexStructure => "IndexStructureError",
            Self::QuantizationOverflow => "QuantizationOverflow",
            Self::GeometryLookup => "GeometryLookupError",
            Self::IoSystem => "IoSystemError",
            Self::Internal => "InternalError",
        }
    }
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Structural failure of one export, import or comparison call.
///
/// Row-local problems (unknown sensor ids) never surface here; they are
/// counted on the operation's summary instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorError {
    category: ErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl ValidatorError {
    pub fn new(
        category: ErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn schema(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::SchemaMismatch, placeholder, message)
    }

    pub fn index_structure(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::IndexStructure, placeholder, message)
    }

    pub fn quantization(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::QuantizationOverflow, placeholder, message)
    }

    pub fn geometry(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::GeometryLookup, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::IoSystem, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, placeholder, message)
    }

    pub const fn category(&self) -> ErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    /// Two stderr lines for a failed command: the tagged message, then the
    /// failure class with the status the process exits with.
    pub fn report(&self) -> String {
        format!(
            "error[{}]: {}\n{} (exit status {})",
            self.placeholder,
            self.message,
            self.category,
            self.exit_code()
        )
    }
}

impl Display for ValidatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.category, self.placeholder, self.message)
    }
}

impl Error for ValidatorError {}

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ParamResult<T> = Result<T, ParamError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamErrorCategory {
    ParameterMissing,
    InputArgumentMissing,
    InvalidInput,
    MissingField,
    IoSystem,
    Internal,
}

impl ParamErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::ParameterMissing => 2,
            Self::InputArgumentMissing => 3,
            Self::InvalidInput => 4,
            Self::MissingField => 5,
            Self::IoSystem => 6,
            Self::Internal => 7,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParameterMissing => "ParameterMissing",
            Self::InputArgumentMissing => "InputArgumentMissing",
            Self::InvalidInput => "InvalidInput",
            Self::MissingField => "MissingField",
            Self::IoSystem => "IoSystem",
            Self::Internal => "Internal",
        }
    }
}

impl Display for ParamErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Error raised anywhere along the Material -> Manager -> Source chain.
///
/// `code` is a stable dotted identifier (`PARAM.MISSING_MATERIAL`, ...) that
/// tests and the CLI match on; `message` names the material, parameter,
/// source or variable involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamError {
    category: ParamErrorCategory,
    code: &'static str,
    message: String,
}

impl ParamError {
    pub fn new(category: ParamErrorCategory, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
        }
    }

    pub fn parameter_missing(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ParamErrorCategory::ParameterMissing, code, message)
    }

    pub fn input_argument_missing(variable: &str) -> Self {
        Self::new(
            ParamErrorCategory::InputArgumentMissing,
            "INPUT.ARGUMENT_MISSING",
            format!("input argument '{variable}' is required but was not provided"),
        )
    }

    pub fn invalid_input(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ParamErrorCategory::InvalidInput, code, message)
    }

    pub fn missing_field(field: &str, context: &str) -> Self {
        Self::new(
            ParamErrorCategory::MissingField,
            "INPUT.MISSING_FIELD",
            format!("'{field}' is a required field in the input {context} when creating a material"),
        )
    }

    pub fn io_system(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ParamErrorCategory::IoSystem, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ParamErrorCategory::Internal, code, message)
    }

    pub const fn category(&self) -> ParamErrorCategory {
        self.category
    }

    pub const fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn is_parameter_missing(&self) -> bool {
        self.category == ParamErrorCategory::ParameterMissing
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.code, self.message)
    }
}

impl Display for ParamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.category, self.code, self.message)
    }
}

impl Error for ParamError {}

#[cfg(test)]
mod tests {
    use super::{ParamError, ParamErrorCategory};

    #[test]
    fn exit_codes_are_stable_per_category() {
        let cases = [
            (ParamErrorCategory::ParameterMissing, 2),
            (ParamErrorCategory::InputArgumentMissing, 3),
            (ParamErrorCategory::InvalidInput, 4),
            (ParamErrorCategory::MissingField, 5),
            (ParamErrorCategory::IoSystem, 6),
            (ParamErrorCategory::Internal, 7),
        ];

        for (category, exit_code) in cases {
            assert_eq!(category.exit_code(), exit_code);
        }
    }

    #[test]
    fn input_argument_missing_names_the_variable() {
        let error = ParamError::input_argument_missing("T");
        assert_eq!(error.category(), ParamErrorCategory::InputArgumentMissing);
        assert!(error.message().contains("'T'"));
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [INPUT.ARGUMENT_MISSING] input argument 'T' is required but was not provided"
        );
    }

    #[test]
    fn missing_field_mentions_name() {
        let error = ParamError::missing_field("name", "dictionary");
        assert_eq!(error.category(), ParamErrorCategory::MissingField);
        assert!(error.to_string().contains("'name'"));
    }
}

//! Error taxonomy for the scan → generate pipeline.
//!
//! Scanning and type parsing report source positions; generation works on the
//! in-memory model and reports by struct/function name instead. The driver
//! wraps everything in `anyhow` and prefixes the unit path.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

// ————————————————————————————————————————————————————————————————————————————
// LOCATION
// ————————————————————————————————————————————————————————————————————————————

/// 1-based line/column of a byte in the scanned source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Location { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ERRORS
// ————————————————————————————————————————————————————————————————————————————

/// Rejections raised while parsing a type expression.
#[derive(Debug, Error)]
pub enum TypeError {
    /// Head token is not in the basic catalog and not a wrapper name.
    #[error("{location}: unsupported type `{token}`")]
    UnsupportedType { token: String, location: Location },

    /// Structurally invalid combination (`Nullable<Nullable<..>>`, non-String
    /// map key, empty wrapper argument lists, and friends).
    #[error("{location}: illegal nesting: {detail}")]
    IllegalNesting { detail: String, location: Location },
}

/// Rejections raised while scanning an annotated declaration.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Marker found but its argument list does not parse.
    #[error("{location}: malformed marker: {detail}")]
    Marker { detail: String, location: Location },

    /// `//!` annotation list hit end of line inside an argument list.
    #[error("{location}: unterminated annotation `{tag}`")]
    UnterminatedAnnotation { tag: String, location: Location },

    /// Generic "wanted X, got Y" while walking a declaration body.
    #[error("{location}: expected {expected}, found `{found}`")]
    Expected {
        expected: String,
        found: String,
        location: Location,
    },

    /// Annotation operand names an identifier with no registered value.
    #[error("{location}: unknown constant `{name}`")]
    UnknownConstant { name: String, location: Location },

    /// Annotation operand exists but disagrees with the member's type.
    #[error("{location}: {tag} on `{member}`: {detail}")]
    OperandType {
        tag: String,
        member: String,
        detail: String,
        location: Location,
    },
}

impl ScanError {
    pub fn location(&self) -> Location {
        match self {
            ScanError::Type(TypeError::UnsupportedType { location, .. }) => *location,
            ScanError::Type(TypeError::IllegalNesting { location, .. }) => *location,
            ScanError::Marker { location, .. } => *location,
            ScanError::UnterminatedAnnotation { location, .. } => *location,
            ScanError::Expected { location, .. } => *location,
            ScanError::UnknownConstant { location, .. } => *location,
            ScanError::OperandType { location, .. } => *location,
        }
    }
}

/// Rejections raised while generating output from a scanned model.
#[derive(Debug, Error)]
pub enum GenError {
    /// The construct is legal in the grammar but has no rendering in the
    /// requested output (sum/tuple members in validation structs, tuples
    /// anywhere but a whole return type, vector or nested-variant sum
    /// alternatives).
    #[error("{context}: {what} is not representable here")]
    Unrepresentable { what: String, context: String },

    /// Two sum alternatives would claim the same incoming stack shape.
    #[error("function `{function}`: variant alternatives `{first}` and `{second}` are indistinguishable on the stack")]
    AmbiguousSum {
        function: String,
        first: String,
        second: String,
    },

    /// A validation struct reached the generator without a dictionary tag.
    #[error("struct `{name}` has no dictionary tag")]
    UntaggedStruct { name: String },
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_renders_line_colon_column() {
        assert_eq!(Location::new(14, 3).to_string(), "14:3");
    }

    #[test]
    fn scan_error_carries_position_through_type_error() {
        let err = ScanError::from(TypeError::UnsupportedType {
            token: "uint64".into(),
            location: Location::new(7, 5),
        });
        assert_eq!(err.location(), Location::new(7, 5));
        assert_eq!(err.to_string(), "7:5: unsupported type `uint64`");
    }

    #[test]
    fn operand_error_names_tag_and_member() {
        let err = ScanError::OperandType {
            tag: "IN_RANGE".into(),
            member: "yaw_speed".into(),
            detail: "string operand on a numeric member".into(),
            location: Location::new(3, 20),
        };
        assert_eq!(
            err.to_string(),
            "3:20: IN_RANGE on `yaw_speed`: string operand on a numeric member"
        );
    }
}

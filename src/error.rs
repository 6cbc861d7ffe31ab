//! # Error Types
//!
//! All errors carry location information (line/column or measure number) so a
//! problem can be traced back to the score description.
//!
//! ## Error Types
//! - `ParseError` - the YAML score description could not be read
//! - `InputError` - a readable description holds an unusable value
//! - `SemanticError` - a measure breaks the duration invariant
//! - `InternalError` - the chord or hand structure is inconsistent
//!
//! `InternalError` is never expected for input that passed validation. The
//! library hands it back like any other error; the binary exits on it.
//!
//! Declining to combine two voices is not an error and never produces one.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngraveError {
    /// Score description syntax error.
    ///
    /// # Example
    /// ```
    /// # use engrave::EngraveError;
    /// let err = EngraveError::ParseError {
    ///     line: 5,
    ///     column: 10,
    ///     message: "unknown field `vioces`".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Parse error at line 5, column 10: unknown field `vioces`");
    /// ```
    #[error("Parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },

    /// A value that is well-formed YAML but meaningless as music.
    ///
    /// # Example
    /// ```
    /// # use engrave::EngraveError;
    /// let err = EngraveError::InputError("bad pitch 'h4'".to_string());
    /// assert_eq!(err.to_string(), "Invalid score data: bad pitch 'h4'");
    /// ```
    #[error("Invalid score data: {0}")]
    InputError(String),

    /// Measure-level validation failure.
    ///
    /// Occurs when the voices or verses of a measure don't add up to the
    /// time signature, or a voice holds nothing but grace notes.
    #[error("Semantic error at measure {measure}: {message}")]
    SemanticError { measure: usize, message: String },

    /// Broken chord/voice structure found while building chords or combining.
    #[error("Internal error at measure {measure}: {message}")]
    InternalError { measure: usize, message: String },
}

impl EngraveError {
    pub(crate) fn internal(measure: usize, message: impl Into<String>) -> Self {
        EngraveError::InternalError {
            measure,
            message: message.into(),
        }
    }
}

impl From<serde_yaml::Error> for EngraveError {
    fn from(err: serde_yaml::Error) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((0, 0));
        EngraveError::ParseError {
            line,
            column,
            message: err.to_string(),
        }
    }
}

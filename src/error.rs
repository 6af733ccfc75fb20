//! ioctl-idlc error type definitions

use thiserror::Error;

/// Error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Parse errors (01)
    E01001, // InvalidSyntax
    E01002, // UndefinedAlias
    E01003, // InvalidEscape

    // Malformed entity errors (02)
    E02001, // InvalidIdentifier
    E02002, // UnknownBuiltinType
    E02003, // ReservedBuiltinName
    E02004, // UnknownKeyword
    E02005, // DuplicateName
    E02006, // SelfShadowing
    E02007, // EmptyCollection

    // Schema mismatch errors (03)
    E03001, // UnexpectedNode
    E03002, // UnknownKey
    E03003, // MissingField
    E03004, // UnexpectedAlternative
    E03005, // UnknownTag
    E03006, // InvalidScalar

    // Schema definition errors (04)
    E04001, // UnsupportedType
    E04002, // UnresolvedReference
    E04003, // DuplicateDefinition

    // IO errors (05)
    E05001, // FileReadError
}

/// Error family, used to tell user input errors from schema definition errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Malformed,
    SchemaMismatch,
    Unsupported,
    Io,
}

impl ErrorCode {
    pub fn kind(&self) -> ErrorKind {
        use ErrorCode::*;
        match self {
            E01001 | E01002 | E01003 => ErrorKind::Parse,
            E02001 | E02002 | E02003 | E02004 | E02005 | E02006 | E02007 => {
                ErrorKind::Malformed
            }
            E03001 | E03002 | E03003 | E03004 | E03005 | E03006 => {
                ErrorKind::SchemaMismatch
            }
            E04001 | E04002 | E04003 => ErrorKind::Unsupported,
            E05001 => ErrorKind::Io,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Source code location
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Loader context: the type being constructed and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub location: SourceLocation,
    pub type_name: String,
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "While constructing {} here:\n  {}",
            self.type_name, self.location
        )
    }
}

/// ioctl-idlc error
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct IdlError {
    pub code: ErrorCode,
    pub message: String,
    pub location: Option<SourceLocation>,
    /// Loader context frames, innermost first
    pub frames: Vec<Frame>,
}

impl IdlError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
            frames: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Push an outer context frame while the error unwinds.
    pub fn add_context(mut self, location: SourceLocation, type_name: impl Into<String>) -> Self {
        self.frames.push(Frame {
            location,
            type_name: type_name.into(),
        });
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Multi-line trace, outermost frame first and the root cause last.
    pub fn trace(&self) -> String {
        let mut lines: Vec<String> = self.frames.iter().rev().map(|f| f.to_string()).collect();
        match self.location {
            Some(location) => lines.push(format!("{} ({})", self, location)),
            None => lines.push(self.to_string()),
        }
        lines.join("\n")
    }
}

pub type Result<T> = std::result::Result<T, IdlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind() {
        assert_eq!(ErrorCode::E01002.kind(), ErrorKind::Parse);
        assert_eq!(ErrorCode::E02005.kind(), ErrorKind::Malformed);
        assert_eq!(ErrorCode::E03004.kind(), ErrorKind::SchemaMismatch);
        assert_eq!(ErrorCode::E04001.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_trace_outermost_first() {
        let err = IdlError::new(ErrorCode::E03002, "Unexpected key foo.")
            .add_context(SourceLocation { line: 3, column: 5 }, "Field")
            .add_context(SourceLocation { line: 1, column: 1 }, "TypeStruct");

        assert_eq!(
            err.trace(),
            "While constructing TypeStruct here:\n  line 1, column 1\n\
             While constructing Field here:\n  line 3, column 5\n\
             [E03002] Unexpected key foo."
        );
    }

    #[test]
    fn test_trace_keeps_cause_location() {
        let err = IdlError::new(ErrorCode::E03002, "Unexpected key foo.")
            .with_location(SourceLocation { line: 4, column: 9 })
            .add_context(SourceLocation { line: 1, column: 1 }, "TypeStruct");

        assert_eq!(
            err.trace(),
            "While constructing TypeStruct here:\n  line 1, column 1\n\
             [E03002] Unexpected key foo. (line 4, column 9)"
        );
    }

    #[test]
    fn test_trace_without_frames() {
        let err = IdlError::new(ErrorCode::E01001, "Parse error")
            .with_location(SourceLocation { line: 2, column: 7 });
        assert_eq!(err.trace(), "[E01001] Parse error (line 2, column 7)");
    }
}

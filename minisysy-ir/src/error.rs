//! Structured, located lowering errors and a collector that
//! accumulates them instead of failing fast.

use std::fmt;

/// A source location attached to every diagnostic. Line/column are
/// 1-based; the (out-of-scope) parser is assumed to stamp these onto
/// every AST node the lowering pass walks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("redeclaration of `{0}`")]
    Redeclaration(String),
    #[error("undeclared identifier `{0}`")]
    UndeclaredIdentifier(String),
    #[error("type mismatch in {site}: got `{got}`, expected `{expected}`")]
    TypeMismatch {
        site: String,
        got: String,
        expected: String,
    },
    #[error("invalid assignment target: not a plain identifier")]
    InvalidLValue,
    #[error("global/const initializer did not fold to a constant integer")]
    NonConstantInitializer,
    #[error("division by zero during constant folding")]
    DivisionByZero,
    #[error("`break` outside a loop")]
    BreakOutsideLoop,
    #[error("`continue` outside a loop")]
    ContinueOutsideLoop,
    #[error("return type does not match the function's declared return type")]
    ReturnTypeMismatch,
}

/// One located diagnostic.
#[derive(Debug, thiserror::Error)]
#[error("{location}: {kind}")]
pub struct LowerError {
    pub location: Location,
    pub kind: ErrorKind,
}

impl LowerError {
    pub fn new(location: Location, kind: ErrorKind) -> Self {
        Self { location, kind }
    }
}

/// Accumulates diagnostics across a whole type-checking/lowering pass
/// instead of stopping at the first error.
#[derive(Default)]
pub struct Diagnostics {
    errors: Vec<LowerError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn push(&mut self, location: Location, kind: ErrorKind) {
        let err = LowerError::new(location, kind);
        if !self
            .errors
            .iter()
            .any(|e| e.location == err.location && format!("{}", e.kind) == format!("{}", err.kind))
        {
            log::warn!("{err}");
            self.errors.push(err);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Consume the collector, returning `Ok(value)` if nothing was
    /// reported and `Err(errors)` otherwise (lowering's result is
    /// discarded whenever any error was reported).
    pub fn into_result<T>(self, value: T) -> Result<T, Vec<LowerError>> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_by_location_and_kind() {
        let mut d = Diagnostics::new();
        let loc = Location { line: 1, column: 1 };
        d.push(loc, ErrorKind::UndeclaredIdentifier("x".into()));
        d.push(loc, ErrorKind::UndeclaredIdentifier("x".into()));
        assert!(d.has_errors());
        let errs = d.into_result(()).unwrap_err();
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn clean_pass_returns_ok() {
        let d = Diagnostics::new();
        assert_eq!(d.into_result(42), Ok(42));
    }
}

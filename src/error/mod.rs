//! Unified error handling for the database engine.
//!
//! This module defines [`DbError`], the single error type propagated
//! throughout every layer — from the page allocator and class catalog,
//! through node storage and pattern matching, up to the public facade.
//!
//! A convenience [`Result<T>`] type alias is re-exported so that callers can
//! write `Result<T>` instead of `std::result::Result<T, DbError>`.

use std::fmt;
use std::io;

/// The canonical error type for all database operations.
///
/// Variants are organised by the taxonomy described for the storage engine
/// so that callers can match on the error category without inspecting
/// free-form strings.
#[derive(Debug)]
pub enum DbError {
    /// An I/O error originating from the filesystem or disk layer, or a
    /// read that reached past the end of the file.
    Io(io::Error),

    /// A structural invariant was broken on read: bad superblock magic, an
    /// unreadable class grammar, or a corrupt page header.
    Structure(String),

    /// A class name used a forbidden character, an argument tuple's
    /// runtime types did not match a class's field list, or an attributed
    /// relation was misused.
    Type(String),

    /// Wrong arity, an invalid offset, or a query for the id/next-free of a
    /// Node in the wrong state.
    BadArgument(String),

    /// A class's serialized form plus header exceeds one page, or an
    /// attributed relation was requested.
    NotImplemented(String),

    /// An internal consistency check failed: a write landed on a slot that
    /// decoded as valid when free was expected, or a pattern had no
    /// attachment point for a new relation.
    Runtime(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Io(err) => write!(f, "I/O error: {err}"),
            DbError::Structure(msg) => write!(f, "structure error: {msg}"),
            DbError::Type(msg) => write!(f, "type error: {msg}"),
            DbError::BadArgument(msg) => write!(f, "bad argument: {msg}"),
            DbError::NotImplemented(msg) => write!(f, "not implemented: {msg}"),
            DbError::Runtime(msg) => write!(f, "runtime error: {msg}"),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for DbError {
    fn from(err: io::Error) -> Self {
        DbError::Io(err)
    }
}

/// A specialised [`Result`] type for database operations.
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts_via_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file missing");
        let db_err: DbError = DbError::from(io_err);
        assert!(matches!(db_err, DbError::Io(_)));
        assert!(db_err.to_string().contains("file missing"));
    }

    #[test]
    fn io_error_converts_via_question_mark() {
        fn might_fail() -> Result<()> {
            let _f = std::fs::File::open("/non/existent/path/daedalus_io_test")?;
            Ok(())
        }

        let err = might_fail().unwrap_err();
        assert!(matches!(err, DbError::Io(_)));
    }

    #[test]
    fn display_messages_are_human_readable() {
        let cases: Vec<(DbError, &str)> = vec![
            (
                DbError::Structure("bad magic".into()),
                "structure error: bad magic",
            ),
            (
                DbError::Type("class name contains '@'".into()),
                "type error: class name contains '@'",
            ),
            (
                DbError::BadArgument("wrong arity".into()),
                "bad argument: wrong arity",
            ),
            (
                DbError::NotImplemented("class larger than a page".into()),
                "not implemented: class larger than a page",
            ),
            (
                DbError::Runtime("no attachment point for relation".into()),
                "runtime error: no attachment point for relation",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn error_source_chains_io_errors() {
        use std::error::Error;

        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let db_err = DbError::Io(io_err);
        assert!(db_err.source().is_some());

        let non_io = DbError::Runtime("bug".into());
        assert!(non_io.source().is_none());
    }
}

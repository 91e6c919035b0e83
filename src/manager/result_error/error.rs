use crate::manager::result_error::{WithDebugObjectAndFnName, WithMsg};
use itertools::Itertools;
use std::fmt::Debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    EmailContent(#[from] lettre::error::Error),
    #[error(transparent)]
    EmailAddress(#[from] lettre::address::AddressError),
    #[error(transparent)]
    SmtpTransport(#[from] lettre::transport::smtp::Error),
    #[error(transparent)]
    Template(#[from] tera::Error),
    /// Captured output of a restic invocation that exited non-zero or wrote
    /// to stderr.
    #[error("{0}")]
    Tool(String),
    #[error("repository path could not be read")]
    RepoUnreadable,
    #[error("repository is not a directory")]
    RepoNotDirectory,
    #[error("snapshot index {index} out of range ({count} snapshots)")]
    SnapshotIndex { index: usize, count: usize },
    #[error("smtp send rejected: {0}")]
    SmtpSend(String),
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{:?} {} failed:\n{}", obj_debug, fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithDebugObjAndFnName {
        error: Box<Error>,
        obj_debug: Box<dyn Debug + Send>,
        fn_name: String,
    },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>, O: Debug + Send + 'static> WithDebugObjectAndFnName<S, O> for Error {
    fn with_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self {
        Error::WithDebugObjAndFnName {
            error: Box::new(self),
            obj_debug: Box::new(obj),
            fn_name: fn_name.into(),
        }
    }
}

impl<S: Into<String>> WithMsg<S> for Error {
    fn with_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl From<Vec<Error>> for Error {
    fn from(errors: Vec<Error>) -> Self {
        if errors.is_empty() {
            panic!("Should not create lots of errors when error is empty")
        }
        Self::LotsOfError(
            errors
                .into_iter()
                .flat_map(|e| e.into_iter())
                .collect_vec(),
        )
    }
}

impl Error {
    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(|e| e.into_iter())),
            e => Box::new(std::iter::once(e)),
        }
    }

    pub fn chain(self, other: Error) -> Error {
        Error::LotsOfError(self.into_iter().chain(other.into_iter()).collect_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error);

        match error {
            Error::Io(_) => (),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_with_msg() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error);
        let error_with_msg = error.with_msg("Custom message");

        match error_with_msg {
            Error::WithMsg { msg, .. } => assert_eq!(msg, "Custom message"),
            _ => panic!("Expected WithMsg error"),
        }
    }

    #[test]
    fn test_error_with_debug_object_and_fn_name() {
        let error = Error::Tool("backup failed".into());
        let error_with_debug = error.with_debug_object_and_fn_name("profile-a", "test_function");

        match error_with_debug {
            Error::WithDebugObjAndFnName { fn_name, .. } => assert_eq!(fn_name, "test_function"),
            _ => panic!("Expected WithDebugObjAndFnName error"),
        }
    }

    #[test]
    fn test_error_from_vec() {
        let errors = vec![
            Error::Tool("error1".into()),
            Error::Tool("error2".into()),
        ];

        let combined_error = Error::from(errors);
        match combined_error {
            Error::LotsOfError(error_vec) => assert_eq!(error_vec.len(), 2),
            _ => panic!("Expected LotsOfError"),
        }
    }

    #[test]
    #[should_panic(expected = "Should not create lots of errors when error is empty")]
    fn test_error_from_empty_vec_panics() {
        let errors: Vec<Error> = vec![];
        let _error = Error::from(errors);
    }

    #[test]
    fn test_error_into_iter() {
        let error = Error::Tool("single".into());
        let mut iter = error.into_iter();

        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_error_chain_flattens() {
        let error1 = Error::Tool("error1".into());
        let error2 = Error::Tool("error2".into()).chain(Error::Tool("error3".into()));

        let chained = error1.chain(error2);
        match chained {
            Error::LotsOfError(errors) => assert_eq!(errors.len(), 3),
            _ => panic!("Expected LotsOfError"),
        }
    }

    #[test]
    fn test_error_with_msg_display() {
        let error = Error::Tool("Fatal: wrong password".into());
        let error_with_msg = error.with_msg("Operation failed");
        let error_str = error_with_msg.to_string();

        assert!(error_str.contains("Operation failed"));
        assert!(error_str.contains("Fatal: wrong password"));
    }

    #[test]
    fn test_snapshot_index_display() {
        let error = Error::SnapshotIndex { index: 3, count: 3 };
        assert_eq!(
            error.to_string(),
            "snapshot index 3 out of range (3 snapshots)"
        );
    }
}

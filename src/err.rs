//! Errors

use crate::client::Status;
use std::{cmp, fmt, error, io};

/**
    Routes the status of a client call through [`Error::report`].

    Evaluates to the successful value of the call or returns the reported error
    from the enclosing function.
*/
macro_rules! catch {
    ( $stage:ident, $debug:expr, $ctx:expr => $call:expr ) => {
        match $call {
            Ok(res) => res,
            Err(status) => {
                return Err( crate::Error::report(crate::Stage::$stage, status, $ctx, file!(), line!(), $debug) );
            }
        }
    };
}

pub(crate) use catch;

/// Component whose client call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pool,
    Connection,
    Statement,
    Lob,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Stage::Pool       => "pool",
            Stage::Connection => "connection",
            Stage::Statement  => "statement",
            Stage::Lob        => "lob",
        };
        f.write_str(name)
    }
}

/// Represents possible errors returned from the gateway
#[derive(Debug)]
pub enum Error {
    /// Invalid configuration
    Config(String),
    /// Request rejected before it reached the database
    Malformed(String),
    /// Request deadline passed
    Timeout(String),
    /// API misuse
    Interface(String),
    /// Failed database client call
    Oracle {
        stage:   Stage,
        code:    i32,
        message: String,
        context: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(msg)    => write!(f, "invalid configuration: {}", msg),
            Error::Malformed(msg) => write!(f, "malformed request: {}", msg),
            Error::Timeout(msg)   => write!(f, "timeout: {}", msg),
            Error::Interface(msg) => write!(f, "{}", msg),
            Error::Oracle { code, message, context, .. } if *code > 0 => write!(f, "{}: ORA-{:05}: {}", context, code, message),
            Error::Oracle { message, context, .. } => write!(f, "{}: {}", context, message),
        }
    }
}

impl error::Error for Error {}

impl cmp::PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        match (self, other) {
            (Error::Oracle { stage: this_stage, code: this_code, .. }, Error::Oracle { stage: other_stage, code: other_code, .. }) => {
                this_stage == other_stage && this_code == other_code
            }
            (Error::Config(this_msg),    Error::Config(other_msg))    => this_msg == other_msg,
            (Error::Malformed(this_msg), Error::Malformed(other_msg)) => this_msg == other_msg,
            (Error::Timeout(this_msg),   Error::Timeout(other_msg))   => this_msg == other_msg,
            (Error::Interface(this_msg), Error::Interface(other_msg)) => this_msg == other_msg,
            _ => false,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        io::Error::new(io::ErrorKind::Other, err)
    }
}

impl Error {
    pub(crate) fn new(msg: &str) -> Self {
        Error::Interface( msg.to_owned() )
    }

    pub(crate) fn msg(msg: String) -> Self {
        Error::Interface(msg)
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::Malformed( msg.into() )
    }

    /**
        Maps the status of a failed client call into an error.

        This is the only place client failures become errors. When `debug` is set the status
        and the source location of the failed call are logged.
    */
    pub fn report(stage: Stage, status: Status, context: &str, file: &str, line: u32, debug: bool) -> Self {
        if debug {
            log::debug!("{}:{}: {} ({}) failed with status {}: {}", file, line, context, stage, status.rc, status);
        }
        Error::Oracle { stage, code: status.code, message: status.message, context: context.to_owned() }
    }

    /// Returns the component of a failed client call.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Oracle { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Returns the database error number of a failed client call.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Oracle { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_keeps_diagnostic() {
        let err = Error::report(Stage::Statement, Status::error(6550, "PLS-00201: identifier 'X' must be declared"), "prepare", file!(), line!(), true);
        assert_eq!(err.stage(), Some(Stage::Statement));
        assert_eq!(err.code(), Some(6550));
        assert_eq!(err.to_string(), "prepare: ORA-06550: PLS-00201: identifier 'X' must be declared");
    }

    #[test]
    fn report_without_code() {
        let err = Error::report(Stage::Lob, Status::new(crate::client::INVALID_HANDLE, 0, "invalid handle"), "lob read", file!(), line!(), false);
        assert_eq!(err.to_string(), "lob read: invalid handle");
        assert_eq!(err, Error::Oracle { stage: Stage::Lob, code: 0, message: String::new(), context: String::new() });
    }
}

// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error type shared by every handle in the crate.
//!
//! Resource-state errors ([`ErrorKind::ClosedResource`],
//! [`ErrorKind::ReleasedResource`]) are raised by the handles themselves
//! before any driver call is made, so their meaning does not depend on how
//! a particular backend reports failures.

use std::error::Error as StdError;
use std::fmt;
use std::io::{self, Error as IOError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

#[derive(Debug)]
pub enum ErrorKind {
    /// No controller matched the identifier, by name or by number.
    DeviceNotFound(String),
    /// The offset is not a line of the controller.
    LineNotFound(u32),
    /// The controller backing the handle has been closed.
    ClosedResource,
    /// The line or group was released, or never requested.
    ReleasedResource,
    RequestFailed(RequestFailure),
    IndexOutOfRange { index: usize, len: usize },
    /// A driver read, write or wait failed.
    IoFailure { op: Operation, cause: IOError },
}

/// Why a request (or a request-shaped argument) was refused.
#[derive(Debug)]
pub enum RequestFailure {
    AlreadyRequested,
    NoLines,
    TooManyLines(usize),
    ValueCount { lines: usize, values: usize },
    Offset(u32),
    InvalidFlags(u32),
    ConflictingFlags(&'static str),
    Driver(IOError),
}

/// The driver call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    LineInfo,
    GetValues,
    SetValues,
    WaitEvent,
    ReadEvent,
    EventFd,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// True when an event read found nothing queued on a non-blocking
    /// descriptor.
    pub fn is_would_block(&self) -> bool {
        match &self.kind {
            ErrorKind::IoFailure { cause, .. } => cause.kind() == io::ErrorKind::WouldBlock,
            _ => false,
        }
    }
}

pub(crate) fn not_found_err(identifier: &str) -> Error {
    Error {
        kind: ErrorKind::DeviceNotFound(identifier.to_owned()),
    }
}

pub(crate) fn line_err(offset: u32) -> Error {
    Error {
        kind: ErrorKind::LineNotFound(offset),
    }
}

pub(crate) fn closed_err() -> Error {
    Error {
        kind: ErrorKind::ClosedResource,
    }
}

pub(crate) fn released_err() -> Error {
    Error {
        kind: ErrorKind::ReleasedResource,
    }
}

pub(crate) fn request_err(failure: RequestFailure) -> Error {
    Error {
        kind: ErrorKind::RequestFailed(failure),
    }
}

pub(crate) fn invalid_err(n_lines: usize, n_values: usize) -> Error {
    request_err(RequestFailure::ValueCount {
        lines: n_lines,
        values: n_values,
    })
}

pub(crate) fn index_err(index: usize, len: usize) -> Error {
    Error {
        kind: ErrorKind::IndexOutOfRange { index, len },
    }
}

pub(crate) fn io_err(op: Operation, cause: IOError) -> Error {
    Error {
        kind: ErrorKind::IoFailure { op, cause },
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Operation::LineInfo => write!(f, "get line info"),
            Operation::GetValues => write!(f, "get line values"),
            Operation::SetValues => write!(f, "set line values"),
            Operation::WaitEvent => write!(f, "wait for line event"),
            Operation::ReadEvent => write!(f, "read line event"),
            Operation::EventFd => write!(f, "get event file descriptor"),
        }
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestFailure::AlreadyRequested => write!(f, "line is already requested"),
            RequestFailure::NoLines => write!(f, "no lines to request"),
            RequestFailure::TooManyLines(n) => write!(f, "{} lines exceed the request limit", n),
            RequestFailure::ValueCount { lines, values } => write!(
                f,
                "{} values supplied but {} lines are in the request",
                values, lines
            ),
            RequestFailure::Offset(offset) => write!(f, "offset {} is out of range", offset),
            RequestFailure::InvalidFlags(bits) => write!(f, "unknown request flags {:#x}", bits),
            RequestFailure::ConflictingFlags(why) => write!(f, "conflicting request flags: {}", why),
            RequestFailure::Driver(err) => err.fmt(f),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ErrorKind::DeviceNotFound(id) => write!(f, "Failed to open GPIO chip: {}", id),
            ErrorKind::LineNotFound(offset) => write!(f, "Failed to get GPIO line: {}", offset),
            ErrorKind::ClosedResource => write!(f, "Chip is closed"),
            ErrorKind::ReleasedResource => write!(f, "Line is released"),
            ErrorKind::RequestFailed(failure) => write!(f, "Request failed: {}", failure),
            ErrorKind::IndexOutOfRange { index, len } => {
                write!(f, "Index {} out of range for {} lines", index, len)
            }
            ErrorKind::IoFailure { op, cause } => write!(f, "Failed to {}: {}", op, cause),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            ErrorKind::RequestFailed(RequestFailure::Driver(err)) => Some(err),
            ErrorKind::IoFailure { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn would_block_only_for_io_failures() {
        let empty = io_err(
            Operation::ReadEvent,
            IOError::from(io::ErrorKind::WouldBlock),
        );
        assert!(empty.is_would_block());
        assert!(!released_err().is_would_block());
        assert!(!io_err(Operation::GetValues, IOError::from_raw_os_error(libc::EIO)).is_would_block());
    }

    #[test]
    fn driver_cause_is_exposed_as_source() {
        let err = request_err(RequestFailure::Driver(IOError::from_raw_os_error(libc::EBUSY)));
        assert!(err.source().is_some());
        assert!(closed_err().source().is_none());
    }

    #[test]
    fn value_count_message_names_both_sizes() {
        let msg = invalid_err(3, 2).to_string();
        assert!(msg.contains("2 values"));
        assert!(msg.contains("3 lines"));
    }
}

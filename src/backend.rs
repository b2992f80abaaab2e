// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The driver interface the handles are built on.
//!
//! [`CdevBackend`](crate::cdev::CdevBackend) talks to the kernel;
//! [`SimBackend`](crate::sim::SimBackend) simulates controllers in memory.
//! Backends report plain `io::Error`s; the handles translate them into
//! [`ErrorKind`](crate::ErrorKind)s.

use std::fmt;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time::Duration;

use crate::event::LineEvent;
use crate::flags::{LineInfo, RequestFlags, RequestMode};

/// Static description of a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipInfo {
    pub name: String,
    pub label: String,
    pub num_lines: u32,
}

/// Everything a backend needs to claim a set of lines.
#[derive(Debug, Clone, Copy)]
pub struct RequestSpec<'a> {
    pub consumer: &'a str,
    pub mode: RequestMode,
    pub flags: RequestFlags,
    pub offsets: &'a [u32],
    /// One entry per offset for output requests, empty otherwise.
    pub default_values: &'a [u8],
}

pub trait Backend: Send + Sync {
    /// Open a controller by device name.
    fn open(&self, name: &str) -> io::Result<Box<dyn ChipDevice>>;

    /// Open a controller by its number (`gpiochip<N>`).
    fn open_by_number(&self, number: u32) -> io::Result<Box<dyn ChipDevice>>;

    /// Names of the controllers present, in enumeration order.
    fn enumerate(&self) -> io::Result<Vec<String>>;

    fn version(&self) -> String;
}

/// An open controller.
pub trait ChipDevice: Send + fmt::Debug {
    fn info(&self) -> &ChipInfo;

    fn line_info(&self, offset: u32) -> io::Result<LineInfo>;

    /// Claim all of `spec.offsets` at once, or none of them.
    fn request(&self, spec: &RequestSpec) -> io::Result<Arc<dyn LineRequest>>;
}

/// Lines claimed by one request. Dropping the last reference releases them.
pub trait LineRequest: Send + Sync + fmt::Debug {
    /// Fill `values` (one slot per requested line) with logical levels.
    fn get_values(&self, values: &mut [u8]) -> io::Result<()>;

    fn set_values(&self, values: &[u8]) -> io::Result<()>;

    /// Wait for a queued edge event without consuming it.
    fn wait_event(&self, timeout: Option<Duration>) -> io::Result<bool>;

    /// Consume one queued edge event; `WouldBlock` if none is queued.
    fn read_event(&self) -> io::Result<LineEvent>;

    /// Descriptor that polls readable while an event is queued.
    fn as_raw_fd(&self) -> RawFd;
}

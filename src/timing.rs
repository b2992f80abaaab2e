// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Timeouts, deadlines and delays expressed in floating-point seconds.

use std::io;
use std::os::unix::io::AsFd;
use std::thread;
use std::time::{Duration, Instant};

use nix::poll::{ppoll, PollFd, PollFlags};
use nix::sys::time::TimeSpec;

/// Convert a second count into a wait timeout.
///
/// Negative, NaN and unrepresentably large values mean "no timeout" and
/// yield `None`.
pub fn timeout_from_secs(seconds: f64) -> Option<Duration> {
    if seconds.is_nan() || seconds < 0.0 {
        None
    } else if seconds >= i64::MAX as f64 {
        None
    } else {
        Some(Duration::from_secs_f64(seconds))
    }
}

/// Absolute deadline `seconds` from now, or `None` for an unbounded wait.
pub fn deadline_from_secs(seconds: f64) -> Option<Instant> {
    timeout_from_secs(seconds).and_then(|timeout| Instant::now().checked_add(timeout))
}

/// Time left until `deadline`, saturating at zero.
pub fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Block the calling thread for `seconds`, with sub-second precision.
///
/// Non-positive and NaN durations return immediately.
pub fn sleep(seconds: f64) {
    if let Some(duration) = timeout_from_secs(seconds) {
        thread::sleep(duration);
    }
}

/// `None` when `timeout` does not fit a `timespec`; such a wait is
/// unbounded in practice.
fn to_timespec(timeout: Duration) -> Option<TimeSpec> {
    if timeout.as_secs() > libc::time_t::MAX as u64 {
        None
    } else {
        Some(TimeSpec::from(timeout))
    }
}

/// Wait until `fd` is readable.
///
/// Returns `Ok(false)` when the timeout expires first. An interrupted wait
/// is reported as an error, not retried.
pub(crate) fn wait_readable<F: AsFd>(fd: &F, timeout: Option<Duration>) -> io::Result<bool> {
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN | PollFlags::POLLPRI)];
    let ready = ppoll(&mut fds, timeout.and_then(to_timespec), None)?;
    if ready > 0
        && fds[0]
            .revents()
            .map_or(false, |revents| revents.contains(PollFlags::POLLNVAL))
    {
        return Err(io::Error::from_raw_os_error(libc::EBADF));
    }
    Ok(ready > 0)
}

// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Handle-based access to Linux GPIO controllers.
//!
//! A [`Chip`] is an open GPIO controller. From it you derive a [`Line`]
//! (one signal) or a [`Lines`] group, request it as an input, an output
//! or an edge-event source under a consumer name, then read and drive
//! levels or wait for edges. Every handle is released when it goes out
//! of scope, and explicit `close`/`release` calls are idempotent.
//!
//! Lines and groups do not keep their controller alive: once the
//! controller is closed every operation on them fails with
//! [`ErrorKind::ClosedResource`], and releasing them is a no-op.
//!
//! # Examples
//!
//! Drive line 4 of `gpiochip0` high:
//!
//! ```no_run
//! use gpio_handles::{Chip, RequestFlags};
//!
//! # fn main() -> gpio_handles::Result<()> {
//! let chip = Chip::open("gpiochip0")?;
//! let mut line = chip.get_line(4)?;
//! line.request_output("driveoutput", 0, RequestFlags::empty())?;
//! line.set_value(1)?;
//! # Ok(())
//! # }
//! ```
//!
//! Read three lines in one call:
//!
//! ```no_run
//! use gpio_handles::{Chip, RequestFlags};
//!
//! # fn main() -> gpio_handles::Result<()> {
//! let chip = Chip::open("0")?;
//! let mut lines = chip.get_lines(&[0, 1, 2])?;
//! lines.request_input("multiread", RequestFlags::BIAS_PULL_DOWN)?;
//! println!("{:?}", lines.get_values()?);
//! # Ok(())
//! # }
//! ```
//!
//! Wait up to half a second for a rising edge:
//!
//! ```no_run
//! use std::time::Duration;
//! use gpio_handles::{Chip, RequestFlags};
//!
//! # fn main() -> gpio_handles::Result<()> {
//! let chip = Chip::open("gpiochip0")?;
//! let mut button = chip.get_line(17)?;
//! button.request_rising_edge_events("button", RequestFlags::empty())?;
//! if button.event_wait(Some(Duration::from_millis(500)))? {
//!     let event = button.event_read()?;
//!     println!("{} at {:.6}", event.event_type(), event.timestamp_secs());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

#[cfg(feature = "async-tokio")]
mod async_tokio;
pub mod backend;
pub mod cdev;
pub mod errors;
mod event;
mod ffi;
mod flags;
mod line;
mod lines;
pub mod sim;
pub mod timing;

#[cfg(feature = "async-tokio")]
pub use crate::async_tokio::AsyncLineEventHandle;
use crate::backend::{Backend, ChipDevice, LineRequest};
use crate::cdev::CdevBackend;
pub use crate::errors::{Error, ErrorKind, Operation, RequestFailure, Result};
use crate::errors::{closed_err, line_err, not_found_err, request_err};
pub use crate::event::LineEvent;
pub use crate::flags::{
    ActiveState, Bias, EdgeDetect, EventType, LineDirection, LineInfo, RequestFlags, RequestMode,
};
pub use crate::line::Line;
pub use crate::lines::Lines;
pub use crate::timing::sleep;

/// Most lines a single request can claim.
pub const MAX_REQUEST_LINES: usize = ffi::GPIOHANDLES_MAX;

pub(crate) type RequestId = u64;

/// A live request, shared by the handles that refer to it.
#[derive(Debug)]
pub(crate) struct RequestEntry {
    pub(crate) request: Arc<dyn LineRequest>,
    pub(crate) num_lines: usize,
    holders: usize,
}

#[derive(Debug)]
pub(crate) struct ChipState {
    device: Option<Box<dyn ChipDevice>>,
    requests: HashMap<RequestId, RequestEntry>,
    next_request: RequestId,
}

impl ChipState {
    pub(crate) fn device(&self) -> Result<&dyn ChipDevice> {
        self.device.as_deref().ok_or_else(closed_err)
    }

    pub(crate) fn register(
        &mut self,
        request: Arc<dyn LineRequest>,
        num_lines: usize,
    ) -> RequestId {
        let id = self.next_request;
        self.next_request += 1;
        self.requests.insert(
            id,
            RequestEntry {
                request,
                num_lines,
                holders: 1,
            },
        );
        id
    }

    /// A request that is gone was dropped when the controller closed.
    pub(crate) fn request(&self, id: RequestId) -> Result<&RequestEntry> {
        self.requests.get(&id).ok_or_else(closed_err)
    }

    pub(crate) fn retain(&mut self, id: RequestId) -> Result<()> {
        let entry = self.requests.get_mut(&id).ok_or_else(closed_err)?;
        entry.holders += 1;
        Ok(())
    }

    pub(crate) fn release(&mut self, id: RequestId) {
        let last = match self.requests.get_mut(&id) {
            Some(entry) => {
                entry.holders -= 1;
                entry.holders == 0
            }
            None => false,
        };
        if last {
            self.requests.remove(&id);
        }
    }

    fn close(&mut self) -> bool {
        self.requests.clear();
        self.device.take().is_some()
    }
}

#[derive(Debug)]
pub(crate) struct ChipInner {
    name: String,
    label: String,
    num_lines: u32,
    state: Mutex<ChipState>,
}

impl ChipInner {
    fn new(device: Box<dyn ChipDevice>) -> Arc<ChipInner> {
        let info = device.info().clone();
        Arc::new(ChipInner {
            name: info.name,
            label: info.label,
            num_lines: info.num_lines,
            state: Mutex::new(ChipState {
                device: Some(device),
                requests: HashMap::new(),
                next_request: 1,
            }),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ChipState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        if self.lock().close() {
            debug!(chip = %self.name, "closed chip");
        }
    }
}

/// Non-owning reference from a line or group back to its controller.
#[derive(Debug, Clone)]
pub(crate) struct ChipRef(Weak<ChipInner>);

impl ChipRef {
    fn upgrade(&self) -> Result<Arc<ChipInner>> {
        self.0.upgrade().ok_or_else(closed_err)
    }

    pub(crate) fn name(&self) -> String {
        self.0
            .upgrade()
            .map_or_else(String::new, |chip| chip.name.clone())
    }

    /// Run `f` against the state of the controller, which must be open.
    pub(crate) fn with_state<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ChipState) -> Result<T>,
    {
        let chip = self.upgrade()?;
        let mut state = chip.lock();
        state.device().map(|_| ())?;
        f(&mut state)
    }

    /// Drop one hold on a request. Does nothing once the controller is gone.
    pub(crate) fn release(&self, id: RequestId) {
        if let Some(chip) = self.0.upgrade() {
            chip.lock().release(id);
        }
    }

    pub(crate) fn chip(&self) -> Result<Chip> {
        let inner = self.upgrade()?;
        inner.lock().device().map(|_| ())?;
        Ok(Chip {
            inner,
            owned: false,
        })
    }
}

/// An open GPIO controller.
///
/// The handle owns the controller: dropping it or calling
/// [`close`](Chip::close) releases every request made through it. Handles
/// obtained from [`Line::chip`] or [`ChipIterator::next_noclose`] do not
/// own the controller and leave it open when dropped.
#[derive(Debug)]
pub struct Chip {
    inner: Arc<ChipInner>,
    owned: bool,
}

impl Chip {
    /// Open a controller through the kernel character-device interface.
    ///
    /// `identifier` is tried as a device name (`"gpiochip0"`) first, then,
    /// if it is an unsigned integer, as a controller number (`"0"`).
    pub fn open(identifier: &str) -> Result<Chip> {
        Chip::open_with(&CdevBackend::default(), identifier)
    }

    /// Open a controller provided by `backend`.
    pub fn open_with<B: Backend + ?Sized>(backend: &B, identifier: &str) -> Result<Chip> {
        let device = match backend.open(identifier) {
            Ok(device) => device,
            Err(by_name) => match identifier.parse::<u32>() {
                Ok(number) => backend.open_by_number(number).map_err(|by_number| {
                    debug!(identifier, %by_name, %by_number, "no such chip");
                    not_found_err(identifier)
                })?,
                Err(_) => {
                    debug!(identifier, %by_name, "no such chip");
                    return Err(not_found_err(identifier));
                }
            },
        };

        let chip = Chip {
            inner: ChipInner::new(device),
            owned: true,
        };
        debug!(
            chip = %chip.inner.name,
            label = %chip.inner.label,
            lines = chip.inner.num_lines,
            "opened chip"
        );
        Ok(chip)
    }

    fn state(&self) -> Result<MutexGuard<'_, ChipState>> {
        let state = self.inner.lock();
        state.device()?;
        Ok(state)
    }

    fn check_open(&self) -> Result<()> {
        self.inner.lock().device().map(|_| ())
    }

    fn downgrade(&self) -> ChipRef {
        ChipRef(Arc::downgrade(&self.inner))
    }

    pub fn name(&self) -> Result<&str> {
        self.check_open()?;
        Ok(&self.inner.name)
    }

    pub fn label(&self) -> Result<&str> {
        self.check_open()?;
        Ok(&self.inner.label)
    }

    pub fn num_lines(&self) -> Result<u32> {
        self.check_open()?;
        Ok(self.inner.num_lines)
    }

    pub fn is_closed(&self) -> bool {
        self.check_open().is_err()
    }

    /// Get the line at `offset`, which must be below
    /// [`num_lines`](Chip::num_lines).
    pub fn get_line(&self, offset: u32) -> Result<Line> {
        let state = self.state()?;
        if offset >= self.inner.num_lines {
            return Err(line_err(offset));
        }
        let info = state.device()?.line_info(offset).map_err(|err| {
            debug!(chip = %self.inner.name, offset, %err, "line info failed");
            line_err(offset)
        })?;
        Ok(Line::new(self.downgrade(), info))
    }

    /// Group the lines at `offsets`, in order.
    ///
    /// Duplicates are kept, so index `i` of the group is always
    /// `offsets[i]`. An empty group is allowed but cannot be requested.
    pub fn get_lines(&self, offsets: &[u32]) -> Result<Lines> {
        self.check_open()?;
        if let Some(&bad) = offsets.iter().find(|&&o| o >= self.inner.num_lines) {
            return Err(request_err(RequestFailure::Offset(bad)));
        }
        Ok(Lines::new(self.downgrade(), offsets.to_vec()))
    }

    /// Every line of the controller, in ascending offset order.
    pub fn get_all_lines(&self) -> Result<Lines> {
        let offsets: Vec<u32> = (0..self.num_lines()?).collect();
        self.get_lines(&offsets)
    }

    /// The first line named `name`, if any.
    pub fn find_line(&self, name: &str) -> Result<Option<Line>> {
        let state = self.state()?;
        let device = state.device()?;
        for offset in 0..self.inner.num_lines {
            let info = device
                .line_info(offset)
                .map_err(|err| errors::io_err(Operation::LineInfo, err))?;
            if info.name.as_deref() == Some(name) {
                return Ok(Some(Line::new(self.downgrade(), info)));
            }
        }
        Ok(None)
    }

    /// Close the controller. Requests made through it are released.
    pub fn close(&mut self) {
        self.inner.close();
    }
}

impl Drop for Chip {
    fn drop(&mut self) {
        if self.owned {
            self.close();
        }
    }
}

/// Iterator over the controllers present on the system.
///
/// Every controller is opened when the iterator is created.
/// [`Iterator::next`] hands a controller over to the caller, who then owns
/// it; [`next_noclose`](ChipIterator::next_noclose) lends it and the
/// iterator closes it in [`close`](ChipIterator::close) or on drop.
#[derive(Debug)]
pub struct ChipIterator {
    pending: VecDeque<Arc<ChipInner>>,
    lent: Vec<Arc<ChipInner>>,
}

/// Iterate over the kernel's GPIO controllers.
///
/// Returns `None` if they cannot be listed or opened.
pub fn chips() -> Option<ChipIterator> {
    ChipIterator::open()
}

impl ChipIterator {
    pub fn open() -> Option<ChipIterator> {
        ChipIterator::open_with(&CdevBackend::default())
    }

    pub fn open_with<B: Backend + ?Sized>(backend: &B) -> Option<ChipIterator> {
        let names = match backend.enumerate() {
            Ok(names) => names,
            Err(err) => {
                debug!(%err, "cannot list chips");
                return None;
            }
        };

        let mut pending = VecDeque::with_capacity(names.len());
        for name in &names {
            match backend.open(name) {
                Ok(device) => pending.push_back(ChipInner::new(device)),
                Err(err) => {
                    debug!(chip = %name, %err, "cannot open chip for iteration");
                    return None;
                }
            }
        }
        debug!(count = pending.len(), "listing chips");
        Some(ChipIterator {
            pending,
            lent: Vec::new(),
        })
    }

    /// Yield the next controller without giving up ownership of it.
    ///
    /// Dropping the returned handle leaves the controller open; closing it
    /// explicitly is allowed.
    pub fn next_noclose(&mut self) -> Option<Chip> {
        let inner = self.pending.pop_front()?;
        self.lent.push(inner.clone());
        Some(Chip {
            inner,
            owned: false,
        })
    }

    /// Close every controller not handed over by [`Iterator::next`].
    /// Later calls to `next` return `None`.
    pub fn close(&mut self) {
        for inner in self.pending.drain(..).chain(self.lent.drain(..)) {
            inner.close();
        }
    }
}

impl Iterator for ChipIterator {
    type Item = Chip;

    fn next(&mut self) -> Option<Chip> {
        self.pending.pop_front().map(|inner| Chip { inner, owned: true })
    }
}

impl Drop for ChipIterator {
    fn drop(&mut self) {
        self.close();
    }
}

/// Version of the kernel backend.
pub fn version() -> String {
    CdevBackend::default().version()
}

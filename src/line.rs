// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::backend::{LineRequest, RequestSpec};
use crate::errors::{io_err, released_err, request_err, Operation, RequestFailure, Result};
use crate::event::LineEvent;
use crate::flags::{ActiveState, Bias, EdgeDetect, LineDirection, LineInfo, RequestFlags, RequestMode};
use crate::timing;
use crate::{Chip, ChipRef, RequestId};

#[derive(Debug, Clone, Copy)]
enum LineState {
    Unrequested,
    Requested {
        id: RequestId,
        index: usize,
        mode: RequestMode,
    },
    Released,
}

/// The request a line currently holds, resolved against its controller.
struct Active {
    request: Arc<dyn LineRequest>,
    index: usize,
    mode: RequestMode,
    num_lines: usize,
}

/// One GPIO line of a controller.
///
/// A line starts unrequested. One of the `request_*` methods claims it
/// from the driver; [`release`](Line::release) (or dropping the handle)
/// gives it back. A released handle stays released: get a new one from
/// the [`Chip`] to request the line again.
///
/// The metadata accessors (`name`, `direction`, ...) report what the driver
/// said when the handle was created or last [`update`](Line::update)d.
/// Like every other operation they fail with
/// [`ReleasedResource`](crate::ErrorKind::ReleasedResource) once the line
/// is released and with [`ClosedResource`](crate::ErrorKind::ClosedResource)
/// once its controller is closed.
#[derive(Debug)]
pub struct Line {
    chip: ChipRef,
    info: LineInfo,
    state: LineState,
}

impl Line {
    pub(crate) fn new(chip: ChipRef, info: LineInfo) -> Line {
        Line {
            chip,
            info,
            state: LineState::Unrequested,
        }
    }

    /// A line sharing a group request. The caller has already taken a
    /// hold on `id`.
    pub(crate) fn shared(
        chip: ChipRef,
        info: LineInfo,
        id: RequestId,
        index: usize,
        mode: RequestMode,
    ) -> Line {
        Line {
            chip,
            info,
            state: LineState::Requested { id, index, mode },
        }
    }

    /// Fails once the line is released or its controller is closed.
    fn check_valid(&self) -> Result<()> {
        if self.is_released() {
            return Err(released_err());
        }
        self.chip.with_state(|_| Ok(()))
    }

    pub fn offset(&self) -> Result<u32> {
        self.check_valid()?;
        Ok(self.info.offset)
    }

    pub fn name(&self) -> Result<Option<&str>> {
        self.check_valid()?;
        Ok(self.info.name.as_deref())
    }

    pub fn consumer(&self) -> Result<Option<&str>> {
        self.check_valid()?;
        Ok(self.info.consumer.as_deref())
    }

    pub fn direction(&self) -> Result<LineDirection> {
        self.check_valid()?;
        Ok(self.info.direction)
    }

    pub fn active_state(&self) -> Result<ActiveState> {
        self.check_valid()?;
        Ok(self.info.active_state)
    }

    pub fn bias(&self) -> Result<Bias> {
        self.check_valid()?;
        Ok(self.info.bias)
    }

    pub fn is_used(&self) -> Result<bool> {
        self.check_valid()?;
        Ok(self.info.used)
    }

    pub fn is_open_drain(&self) -> Result<bool> {
        self.check_valid()?;
        Ok(self.info.open_drain)
    }

    pub fn is_open_source(&self) -> Result<bool> {
        self.check_valid()?;
        Ok(self.info.open_source)
    }

    /// All cached metadata at once.
    pub fn info(&self) -> Result<&LineInfo> {
        self.check_valid()?;
        Ok(&self.info)
    }

    pub fn is_requested(&self) -> bool {
        matches!(self.state, LineState::Requested { .. })
    }

    pub fn is_released(&self) -> bool {
        matches!(self.state, LineState::Released)
    }

    /// A non-owning handle to the line's controller, while it is open.
    pub fn chip(&self) -> Result<Chip> {
        self.chip.chip()
    }

    /// Re-read the line metadata from the driver.
    pub fn update(&mut self) -> Result<()> {
        self.check_valid()?;
        let offset = self.info.offset;
        self.info = self.chip.with_state(|state| {
            state
                .device()?
                .line_info(offset)
                .map_err(|err| io_err(Operation::LineInfo, err))
        })?;
        Ok(())
    }

    /// Request the line as an input.
    pub fn request_input(&mut self, consumer: &str, flags: RequestFlags) -> Result<()> {
        self.request(consumer, RequestMode::Input, flags, 0)
    }

    /// Request the line as an output, initially driven to `default_value`.
    pub fn request_output(
        &mut self,
        consumer: &str,
        default_value: u8,
        flags: RequestFlags,
    ) -> Result<()> {
        self.request(consumer, RequestMode::Output, flags, default_value)
    }

    pub fn request_rising_edge_events(&mut self, consumer: &str, flags: RequestFlags) -> Result<()> {
        self.request(consumer, RequestMode::Events(EdgeDetect::Rising), flags, 0)
    }

    pub fn request_falling_edge_events(&mut self, consumer: &str, flags: RequestFlags) -> Result<()> {
        self.request(consumer, RequestMode::Events(EdgeDetect::Falling), flags, 0)
    }

    pub fn request_both_edges_events(&mut self, consumer: &str, flags: RequestFlags) -> Result<()> {
        self.request(consumer, RequestMode::Events(EdgeDetect::Both), flags, 0)
    }

    /// Request the line in `mode`. `default_value` is only used for
    /// outputs.
    pub fn request(
        &mut self,
        consumer: &str,
        mode: RequestMode,
        flags: RequestFlags,
        default_value: u8,
    ) -> Result<()> {
        match self.state {
            LineState::Released => return Err(released_err()),
            LineState::Requested { .. } => {
                return Err(request_err(RequestFailure::AlreadyRequested))
            }
            LineState::Unrequested => {}
        }
        flags.validate_for(mode)?;

        let offsets = [self.info.offset];
        let output_default = [default_value];
        let default_values: &[u8] = if mode == RequestMode::Output {
            &output_default
        } else {
            &[]
        };
        let spec = RequestSpec {
            consumer,
            mode,
            flags,
            offsets: &offsets,
            default_values,
        };
        let id = self.chip.with_state(|state| {
            let request = state
                .device()?
                .request(&spec)
                .map_err(|err| request_err(RequestFailure::Driver(err)))?;
            Ok(state.register(request, 1))
        })?;
        self.state = LineState::Requested { id, index: 0, mode };
        debug!(
            chip = %self.chip.name(),
            offset = self.info.offset,
            consumer,
            ?mode,
            ?flags,
            "requested line"
        );

        if let Err(err) = self.update() {
            warn!(offset = self.info.offset, %err, "cannot refresh line info after request");
        }
        Ok(())
    }

    fn active(&self) -> Result<Active> {
        let (id, index, mode) = match self.state {
            LineState::Requested { id, index, mode } => (id, index, mode),
            _ => return Err(released_err()),
        };
        self.chip.with_state(|state| {
            let entry = state.request(id)?;
            Ok(Active {
                request: entry.request.clone(),
                index,
                mode,
                num_lines: entry.num_lines,
            })
        })
    }

    /// Read the logical level, 0 or 1.
    pub fn get_value(&self) -> Result<u8> {
        let active = self.active()?;
        let mut values = vec![0u8; active.num_lines];
        active
            .request
            .get_values(&mut values)
            .map_err(|err| io_err(Operation::GetValues, err))?;
        let value = values[active.index];
        trace!(offset = self.info.offset, value, "read line");
        Ok(value)
    }

    /// Drive the logical level. Any non-zero value drives the line active.
    ///
    /// For a line shared with a group request the other lines of the group
    /// are rewritten with the levels read back just before.
    pub fn set_value(&self, value: u8) -> Result<()> {
        let active = self.active()?;
        let value = (value != 0) as u8;
        let mut values = vec![value];
        if active.num_lines > 1 {
            values = vec![0u8; active.num_lines];
            active
                .request
                .get_values(&mut values)
                .map_err(|err| io_err(Operation::GetValues, err))?;
            values[active.index] = value;
        }
        active
            .request
            .set_values(&values)
            .map_err(|err| io_err(Operation::SetValues, err))?;
        trace!(offset = self.info.offset, value, "wrote line");
        Ok(())
    }

    fn active_events(&self, op: Operation) -> Result<Active> {
        let active = self.active()?;
        if !active.mode.is_events() {
            return Err(io_err(op, io::Error::from_raw_os_error(libc::EPERM)));
        }
        Ok(active)
    }

    /// Wait for an edge event, at most `timeout` (`None` waits forever).
    ///
    /// Returns whether an event is ready; the event stays queued.
    pub fn event_wait(&self, timeout: Option<Duration>) -> Result<bool> {
        self.active_events(Operation::WaitEvent)?
            .request
            .wait_event(timeout)
            .map_err(|err| io_err(Operation::WaitEvent, err))
    }

    /// Wait for an edge event until `deadline`.
    pub fn event_wait_until(&self, deadline: Instant) -> Result<bool> {
        self.event_wait(Some(timing::remaining(deadline)))
    }

    /// Consume one queued edge event.
    ///
    /// Fails without blocking when nothing is queued; see
    /// [`Error::is_would_block`](crate::Error::is_would_block).
    pub fn event_read(&self) -> Result<LineEvent> {
        let event = self
            .active_events(Operation::ReadEvent)?
            .request
            .read_event()
            .map_err(|err| io_err(Operation::ReadEvent, err))?;
        trace!(offset = self.info.offset, ?event, "read event");
        Ok(event)
    }

    /// Descriptor that polls readable while an edge event is queued, for use
    /// with an external event loop.
    ///
    /// The descriptor is owned by the request: releasing the line or
    /// closing its controller closes it, so deregister it from the event
    /// loop first.
    pub fn event_get_fd(&self) -> Result<RawFd> {
        Ok(self.active_events(Operation::EventFd)?.request.as_raw_fd())
    }

    /// The event request itself, keeping its descriptor open for as long
    /// as the returned handle lives.
    #[cfg(feature = "async-tokio")]
    pub(crate) fn event_request(&self) -> Result<Arc<dyn LineRequest>> {
        Ok(self.active_events(Operation::EventFd)?.request)
    }

    /// Give the line back to the driver. Calling it again does nothing.
    pub fn release(&mut self) {
        if let LineState::Requested { id, .. } = self.state {
            self.chip.release(id);
            debug!(offset = self.info.offset, "released line");
        }
        self.state = LineState::Released;
    }
}

impl Drop for Line {
    fn drop(&mut self) {
        self.release();
    }
}

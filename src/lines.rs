// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use tracing::{debug, trace};

use crate::backend::RequestSpec;
use crate::errors::{
    index_err, invalid_err, io_err, line_err, released_err, request_err, Operation,
    RequestFailure, Result,
};
use crate::ffi::GPIOHANDLES_MAX;
use crate::flags::{RequestFlags, RequestMode};
use crate::line::Line;
use crate::{ChipRef, RequestId};

#[derive(Debug, Clone, Copy)]
enum GroupState {
    Unrequested,
    Requested { id: RequestId, mode: RequestMode },
    Released,
}

/// An ordered group of lines of one controller, requested and accessed
/// together.
///
/// Index `i` of the group always refers to the `i`-th offset it was built
/// from, and every value slice passed in or returned has exactly
/// [`num_lines`](Lines::num_lines) entries, in the same order. Requests are
/// all-or-nothing. Reads and writes are single driver calls; if one fails
/// part way the line levels are whatever the hardware left them at.
#[derive(Debug)]
pub struct Lines {
    chip: ChipRef,
    offsets: Vec<u32>,
    state: GroupState,
}

impl Lines {
    pub(crate) fn new(chip: ChipRef, offsets: Vec<u32>) -> Lines {
        Lines {
            chip,
            offsets,
            state: GroupState::Unrequested,
        }
    }

    pub fn num_lines(&self) -> usize {
        self.offsets.len()
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn is_requested(&self) -> bool {
        matches!(self.state, GroupState::Requested { .. })
    }

    /// The line at `index` of the group.
    ///
    /// If the group is requested, the returned line shares the request:
    /// it can read and write its own level, and the lines stay claimed
    /// until both the group and the line are released.
    pub fn get_line(&self, index: usize) -> Result<Line> {
        let offset = *self
            .offsets
            .get(index)
            .ok_or_else(|| index_err(index, self.offsets.len()))?;
        self.chip.with_state(|state| {
            let info = state
                .device()?
                .line_info(offset)
                .map_err(|_| line_err(offset))?;
            match self.state {
                GroupState::Requested { id, mode } => {
                    state.retain(id)?;
                    Ok(Line::shared(self.chip.clone(), info, id, index, mode))
                }
                _ => Ok(Line::new(self.chip.clone(), info)),
            }
        })
    }

    pub fn request_input(&mut self, consumer: &str, flags: RequestFlags) -> Result<()> {
        self.request(consumer, RequestMode::Input, flags, &[])
    }

    /// Request every line as an output. `default_values` must hold one
    /// value per line.
    pub fn request_output(
        &mut self,
        consumer: &str,
        default_values: &[u8],
        flags: RequestFlags,
    ) -> Result<()> {
        self.request(consumer, RequestMode::Output, flags, default_values)
    }

    fn request(
        &mut self,
        consumer: &str,
        mode: RequestMode,
        flags: RequestFlags,
        default_values: &[u8],
    ) -> Result<()> {
        match self.state {
            GroupState::Released => return Err(released_err()),
            GroupState::Requested { .. } => {
                return Err(request_err(RequestFailure::AlreadyRequested))
            }
            GroupState::Unrequested => {}
        }
        self.chip.with_state(|_| Ok(()))?;
        let n = self.offsets.len();
        if n == 0 {
            return Err(request_err(RequestFailure::NoLines));
        }
        if n > GPIOHANDLES_MAX {
            return Err(request_err(RequestFailure::TooManyLines(n)));
        }
        if mode == RequestMode::Output && default_values.len() != n {
            return Err(invalid_err(n, default_values.len()));
        }
        flags.validate_for(mode)?;

        let spec = RequestSpec {
            consumer,
            mode,
            flags,
            offsets: &self.offsets,
            default_values,
        };
        let id = self.chip.with_state(|state| {
            let request = state
                .device()?
                .request(&spec)
                .map_err(|err| request_err(RequestFailure::Driver(err)))?;
            Ok(state.register(request, n))
        })?;
        self.state = GroupState::Requested { id, mode };
        debug!(
            chip = %self.chip.name(),
            offsets = ?self.offsets,
            consumer,
            ?mode,
            ?flags,
            "requested lines"
        );
        Ok(())
    }

    fn request_id(&self) -> Result<RequestId> {
        match self.state {
            GroupState::Requested { id, .. } => Ok(id),
            _ => Err(released_err()),
        }
    }

    /// Read the logical level of every line, in group order.
    pub fn get_values(&self) -> Result<Vec<u8>> {
        let id = self.request_id()?;
        let request = self
            .chip
            .with_state(|state| Ok(state.request(id)?.request.clone()))?;
        let mut values = vec![0u8; self.offsets.len()];
        request
            .get_values(&mut values)
            .map_err(|err| io_err(Operation::GetValues, err))?;
        trace!(offsets = ?self.offsets, ?values, "read lines");
        Ok(values)
    }

    /// Drive every line, `values[i]` to line `i`. Any non-zero value drives
    /// the line active.
    pub fn set_values(&self, values: &[u8]) -> Result<()> {
        let id = self.request_id()?;
        let request = self
            .chip
            .with_state(|state| Ok(state.request(id)?.request.clone()))?;
        if values.len() != self.offsets.len() {
            return Err(invalid_err(self.offsets.len(), values.len()));
        }
        let values: Vec<u8> = values.iter().map(|&v| (v != 0) as u8).collect();
        request
            .set_values(&values)
            .map_err(|err| io_err(Operation::SetValues, err))?;
        trace!(offsets = ?self.offsets, ?values, "wrote lines");
        Ok(())
    }

    /// Release every line of the group. Calling it again does nothing.
    pub fn release(&mut self) {
        if let GroupState::Requested { id, .. } = self.state {
            self.chip.release(id);
            debug!(offsets = ?self.offsets, "released lines");
        }
        self.state = GroupState::Released;
    }
}

impl Drop for Lines {
    fn drop(&mut self) {
        self.release();
    }
}

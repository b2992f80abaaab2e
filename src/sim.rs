// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! In-memory GPIO controllers.
//!
//! A [`SimChip`] behaves like a controller whose outputs are looped back:
//! reading a line returns the level it drives, or for inputs the level set
//! with [`SimChip::set_pull`]. Pulling an input that is armed for events
//! queues an edge event. Claims follow the kernel rules: a line held by
//! one request is busy (`EBUSY`) for every other request, and writes to
//! lines not requested as outputs fail with `EPERM`.
//!
//! ```
//! use gpio_handles::sim::{SimBackend, SimChip};
//! use gpio_handles::{Chip, RequestFlags};
//!
//! # fn main() -> gpio_handles::Result<()> {
//! let backend = SimBackend::new().with_chip(SimChip::new("gpiochip0", "sim", 8));
//! let chip = Chip::open_with(&backend, "gpiochip0")?;
//! let mut led = chip.get_line(4)?;
//! led.request_output("blinky", 0, RequestFlags::empty())?;
//! led.set_value(1)?;
//! assert_eq!(led.get_value()?, 1);
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::backend::{Backend, ChipDevice, ChipInfo, LineRequest, RequestSpec};
use crate::event::LineEvent;
use crate::flags::{ActiveState, Bias, EventType, LineDirection, LineInfo, RequestFlags, RequestMode};
use crate::timing;

fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

/// A set of simulated controllers.
#[derive(Debug, Clone, Default)]
pub struct SimBackend {
    chips: Vec<SimChip>,
}

impl SimBackend {
    pub fn new() -> SimBackend {
        SimBackend::default()
    }

    pub fn with_chip(mut self, chip: SimChip) -> SimBackend {
        self.chips.push(chip);
        self
    }

    /// Handle to the simulated controller called `name`.
    pub fn chip(&self, name: &str) -> Option<SimChip> {
        self.chips.iter().find(|c| c.shared.info.name == name).cloned()
    }
}

impl Backend for SimBackend {
    fn open(&self, name: &str) -> io::Result<Box<dyn ChipDevice>> {
        match self.chip(name) {
            Some(chip) => Ok(Box::new(SimDevice { chip })),
            None => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }

    fn open_by_number(&self, number: u32) -> io::Result<Box<dyn ChipDevice>> {
        self.open(&format!("gpiochip{}", number))
    }

    fn enumerate(&self) -> io::Result<Vec<String>> {
        Ok(self.chips.iter().map(|c| c.shared.info.name.clone()).collect())
    }

    fn version(&self) -> String {
        format!("{} (simulated)", env!("CARGO_PKG_VERSION"))
    }
}

#[derive(Debug)]
struct Claim {
    request: u64,
    consumer: String,
    mode: RequestMode,
    flags: RequestFlags,
    events: Arc<EventQueue>,
}

impl Claim {
    fn active_low(&self) -> bool {
        self.flags.contains(RequestFlags::ACTIVE_LOW)
    }
}

#[derive(Debug, Default)]
struct SimLine {
    name: Option<String>,
    pull: u8,
    output: Option<u8>,
    claim: Option<Claim>,
}

impl SimLine {
    fn physical(&self) -> u8 {
        self.output.unwrap_or(self.pull)
    }

    fn logical(&self) -> u8 {
        let active_low = self.claim.as_ref().map_or(false, Claim::active_low);
        self.physical() ^ active_low as u8
    }
}

#[derive(Debug)]
struct SimChipShared {
    info: ChipInfo,
    epoch: Instant,
    next_request: AtomicU64,
    lines: Mutex<Vec<SimLine>>,
}

impl SimChipShared {
    fn lines(&self) -> MutexGuard<'_, Vec<SimLine>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One simulated controller. Clones share state.
#[derive(Debug, Clone)]
pub struct SimChip {
    shared: Arc<SimChipShared>,
}

impl SimChip {
    pub fn new(name: &str, label: &str, num_lines: u32) -> SimChip {
        let lines = (0..num_lines).map(|_| SimLine::default()).collect();
        SimChip {
            shared: Arc::new(SimChipShared {
                info: ChipInfo {
                    name: name.to_owned(),
                    label: label.to_owned(),
                    num_lines,
                },
                epoch: Instant::now(),
                next_request: AtomicU64::new(1),
                lines: Mutex::new(lines),
            }),
        }
    }

    /// Give line `offset` a name. Out-of-range offsets are ignored.
    pub fn with_line_name(self, offset: u32, name: &str) -> SimChip {
        if let Some(line) = self.shared.lines().get_mut(offset as usize) {
            line.name = Some(name.to_owned());
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.shared.info.name
    }

    /// Set the externally applied (physical) level of an input line.
    ///
    /// An edge is queued when the logical level of a line armed for that
    /// edge changes. Lines driven as outputs ignore the pull.
    pub fn set_pull(&self, offset: u32, level: u8) {
        let mut lines = self.shared.lines();
        let line = match lines.get_mut(offset as usize) {
            Some(line) => line,
            None => return,
        };
        let before = line.logical();
        line.pull = (level != 0) as u8;
        let after = line.logical();
        if before == after || line.output.is_some() {
            return;
        }

        let kind = if after == 1 {
            EventType::RisingEdge
        } else {
            EventType::FallingEdge
        };
        if let Some(claim) = &line.claim {
            if let RequestMode::Events(edges) = claim.mode {
                if edges.matches(kind) {
                    claim
                        .events
                        .push(LineEvent::new(kind, self.shared.epoch.elapsed()));
                }
            }
        }
    }

    /// Physical level currently present on `offset`.
    pub fn level(&self, offset: u32) -> Option<u8> {
        self.shared
            .lines()
            .get(offset as usize)
            .map(SimLine::physical)
    }

    pub fn is_requested(&self, offset: u32) -> bool {
        self.shared
            .lines()
            .get(offset as usize)
            .map_or(false, |line| line.claim.is_some())
    }
}

#[derive(Debug)]
struct SimDevice {
    chip: SimChip,
}

impl ChipDevice for SimDevice {
    fn info(&self) -> &ChipInfo {
        &self.chip.shared.info
    }

    fn line_info(&self, offset: u32) -> io::Result<LineInfo> {
        let lines = self.chip.shared.lines();
        let line = lines.get(offset as usize).ok_or_else(|| errno(libc::EINVAL))?;
        let claim = line.claim.as_ref();
        let flags = claim.map_or(RequestFlags::empty(), |c| c.flags);

        Ok(LineInfo {
            offset,
            name: line.name.clone(),
            consumer: claim.map(|c| c.consumer.clone()),
            direction: if line.output.is_some() {
                LineDirection::Output
            } else {
                LineDirection::Input
            },
            active_state: if flags.contains(RequestFlags::ACTIVE_LOW) {
                ActiveState::Low
            } else {
                ActiveState::High
            },
            bias: claim.map_or(Bias::AsIs, |c| c.flags.bias()),
            used: claim.is_some(),
            open_drain: flags.contains(RequestFlags::OPEN_DRAIN),
            open_source: flags.contains(RequestFlags::OPEN_SOURCE),
        })
    }

    fn request(&self, spec: &RequestSpec) -> io::Result<Arc<dyn LineRequest>> {
        let shared = &self.chip.shared;
        let mut lines = shared.lines();

        if spec.offsets.is_empty() || (spec.mode.is_events() && spec.offsets.len() != 1) {
            return Err(errno(libc::EINVAL));
        }
        if spec.mode == RequestMode::Output && spec.default_values.len() != spec.offsets.len() {
            return Err(errno(libc::EINVAL));
        }
        for (i, &offset) in spec.offsets.iter().enumerate() {
            let line = lines.get(offset as usize).ok_or_else(|| errno(libc::EINVAL))?;
            if line.claim.is_some() || spec.offsets[..i].contains(&offset) {
                return Err(errno(libc::EBUSY));
            }
        }

        let id = shared.next_request.fetch_add(1, Ordering::Relaxed);
        let events = Arc::new(EventQueue::new()?);
        let active_low = spec.flags.contains(RequestFlags::ACTIVE_LOW);
        for (i, &offset) in spec.offsets.iter().enumerate() {
            let line = &mut lines[offset as usize];
            line.claim = Some(Claim {
                request: id,
                consumer: spec.consumer.to_owned(),
                mode: spec.mode,
                flags: spec.flags,
                events: events.clone(),
            });
            if spec.mode == RequestMode::Output {
                line.output = Some((spec.default_values[i] != 0) as u8 ^ active_low as u8);
            }
        }

        Ok(Arc::new(SimRequest {
            chip: self.chip.clone(),
            id,
            offsets: spec.offsets.to_vec(),
            mode: spec.mode,
            active_low,
            events,
        }))
    }
}

#[derive(Debug)]
struct SimRequest {
    chip: SimChip,
    id: u64,
    offsets: Vec<u32>,
    mode: RequestMode,
    active_low: bool,
    events: Arc<EventQueue>,
}

impl LineRequest for SimRequest {
    fn get_values(&self, values: &mut [u8]) -> io::Result<()> {
        let lines = self.chip.shared.lines();
        for (slot, &offset) in values.iter_mut().zip(&self.offsets) {
            *slot = lines[offset as usize].logical();
        }
        Ok(())
    }

    fn set_values(&self, values: &[u8]) -> io::Result<()> {
        if self.mode != RequestMode::Output {
            return Err(errno(libc::EPERM));
        }
        let mut lines = self.chip.shared.lines();
        for (&value, &offset) in values.iter().zip(&self.offsets) {
            lines[offset as usize].output = Some((value != 0) as u8 ^ self.active_low as u8);
        }
        Ok(())
    }

    fn wait_event(&self, timeout: Option<Duration>) -> io::Result<bool> {
        if !self.mode.is_events() {
            return Err(errno(libc::EPERM));
        }
        timing::wait_readable(&self.events.rx, timeout)
    }

    fn read_event(&self) -> io::Result<LineEvent> {
        if !self.mode.is_events() {
            return Err(errno(libc::EPERM));
        }
        self.events.pop()
    }

    fn as_raw_fd(&self) -> RawFd {
        self.events.as_raw_fd()
    }
}

impl Drop for SimRequest {
    fn drop(&mut self) {
        let mut lines = self.chip.shared.lines();
        for &offset in &self.offsets {
            let line = &mut lines[offset as usize];
            if line.claim.as_ref().map_or(false, |c| c.request == self.id) {
                line.claim = None;
                line.output = None;
            }
        }
    }
}

/// Event FIFO whose readiness is mirrored on a socket pair, so it can be
/// polled like a kernel event descriptor.
#[derive(Debug)]
struct EventQueue {
    events: Mutex<VecDeque<LineEvent>>,
    tx: UnixStream,
    rx: UnixStream,
}

impl EventQueue {
    fn new() -> io::Result<EventQueue> {
        let (tx, rx) = UnixStream::pair()?;
        tx.set_nonblocking(true)?;
        rx.set_nonblocking(true)?;
        Ok(EventQueue {
            events: Mutex::new(VecDeque::new()),
            tx,
            rx,
        })
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<LineEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: LineEvent) {
        let mut queue = self.queue();
        if queue.is_empty() {
            // One byte marks "non-empty"; a full socket is already readable.
            let _ = (&self.tx).write(&[1]);
        }
        queue.push_back(event);
    }

    fn pop(&self) -> io::Result<LineEvent> {
        let mut queue = self.queue();
        let event = queue
            .pop_front()
            .ok_or_else(|| io::Error::from(io::ErrorKind::WouldBlock))?;
        if queue.is_empty() {
            let mut buf = [0u8; 64];
            while let Ok(n) = (&self.rx).read(&mut buf) {
                if n == 0 {
                    break;
                }
            }
        }
        Ok(event)
    }

    fn as_raw_fd(&self) -> RawFd {
        self.rx.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::EdgeDetect;

    fn spec<'a>(mode: RequestMode, offsets: &'a [u32], defaults: &'a [u8]) -> RequestSpec<'a> {
        RequestSpec {
            consumer: "test",
            mode,
            flags: RequestFlags::empty(),
            offsets,
            default_values: defaults,
        }
    }

    fn device(num_lines: u32) -> (SimChip, Box<dyn ChipDevice>) {
        let chip = SimChip::new("gpiochip0", "sim", num_lines);
        let backend = SimBackend::new().with_chip(chip.clone());
        (chip, backend.open("gpiochip0").unwrap())
    }

    #[test]
    fn open_by_name_and_number() {
        let backend = SimBackend::new()
            .with_chip(SimChip::new("gpiochip0", "a", 4))
            .with_chip(SimChip::new("gpiochip3", "b", 4));
        assert_eq!(backend.open_by_number(3).unwrap().info().label, "b");
        assert!(backend.open("gpiochip1").is_err());
        assert_eq!(backend.enumerate().unwrap(), vec!["gpiochip0", "gpiochip3"]);
    }

    #[test]
    fn claimed_lines_are_busy() {
        let (_chip, dev) = device(4);
        let _held = dev.request(&spec(RequestMode::Input, &[1], &[])).unwrap();
        let err = dev.request(&spec(RequestMode::Input, &[0, 1], &[])).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBUSY));
        let dup = dev.request(&spec(RequestMode::Input, &[2, 2], &[])).unwrap_err();
        assert_eq!(dup.raw_os_error(), Some(libc::EBUSY));
    }

    #[test]
    fn failed_request_claims_nothing() {
        let (chip, dev) = device(4);
        assert!(dev.request(&spec(RequestMode::Input, &[0, 9], &[])).is_err());
        assert!(!chip.is_requested(0));
    }

    #[test]
    fn dropping_request_frees_lines() {
        let (chip, dev) = device(4);
        let req = dev.request(&spec(RequestMode::Output, &[2], &[1])).unwrap();
        assert_eq!(chip.level(2), Some(1));
        drop(req);
        assert!(!chip.is_requested(2));
        assert_eq!(chip.level(2), Some(0));
    }

    #[test]
    fn active_low_output_inverts_physical_level() {
        let (chip, dev) = device(2);
        let mut s = spec(RequestMode::Output, &[0], &[1]);
        s.flags = RequestFlags::ACTIVE_LOW;
        let req = dev.request(&s).unwrap();
        assert_eq!(chip.level(0), Some(0));
        let mut values = [9u8];
        req.get_values(&mut values).unwrap();
        assert_eq!(values, [1]);
    }

    #[test]
    fn inputs_refuse_writes() {
        let (_chip, dev) = device(2);
        let req = dev.request(&spec(RequestMode::Input, &[0], &[])).unwrap();
        assert_eq!(req.set_values(&[1]).unwrap_err().raw_os_error(), Some(libc::EPERM));
    }

    #[test]
    fn edges_are_filtered_and_queued() {
        let (chip, dev) = device(2);
        let req = dev
            .request(&spec(RequestMode::Events(EdgeDetect::Falling), &[1], &[]))
            .unwrap();
        chip.set_pull(1, 1);
        assert!(!req.wait_event(Some(Duration::from_millis(0))).unwrap());
        chip.set_pull(1, 0);
        assert!(req.wait_event(Some(Duration::from_millis(0))).unwrap());
        assert_eq!(req.read_event().unwrap().event_type(), EventType::FallingEdge);
        assert_eq!(
            req.read_event().unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
        assert!(!req.wait_event(Some(Duration::from_millis(0))).unwrap());
    }

    #[test]
    fn line_info_reflects_claim() {
        let (_chip, dev) = device(2);
        let mut s = spec(RequestMode::Input, &[1], &[]);
        s.flags = RequestFlags::BIAS_PULL_UP;
        let _req = dev.request(&s).unwrap();
        let info = dev.line_info(1).unwrap();
        assert!(info.used);
        assert_eq!(info.consumer.as_deref(), Some("test"));
        assert_eq!(info.bias, Bias::PullUp);
        assert!(dev.line_info(2).is_err());
    }
}

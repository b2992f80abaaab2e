// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Named request options and line-state codes.
//!
//! [`RequestFlags`] is what callers pass to the `request_*` operations.
//! Its bit values are the conventional libgpiod ones so that a raw integer
//! obtained elsewhere can be validated with [`RequestFlags::from_raw`]; the
//! kernel representation is produced by [`RequestFlags::handle_flags`].

use std::fmt;

use bitflags::bitflags;

use crate::errors::{request_err, RequestFailure, Result};
use crate::ffi::{EventRequestFlags, HandleRequestFlags, LineInfoFlags};

bitflags! {
    /// Electrical options applied when a line is requested.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestFlags: u32 {
        const OPEN_DRAIN = (1 << 0);
        const OPEN_SOURCE = (1 << 1);
        const ACTIVE_LOW = (1 << 2);
        const BIAS_DISABLE = (1 << 3);
        const BIAS_PULL_DOWN = (1 << 4);
        const BIAS_PULL_UP = (1 << 5);
    }
}

/// What a request asks the driver for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Input,
    Output,
    Events(EdgeDetect),
}

/// Which transitions an event request reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDetect {
    Rising,
    Falling,
    Both,
}

impl RequestMode {
    pub fn is_events(self) -> bool {
        matches!(self, RequestMode::Events(_))
    }
}

impl EdgeDetect {
    pub(crate) fn event_flags(self) -> EventRequestFlags {
        match self {
            EdgeDetect::Rising => EventRequestFlags::RISING_EDGE,
            EdgeDetect::Falling => EventRequestFlags::FALLING_EDGE,
            EdgeDetect::Both => EventRequestFlags::BOTH_EDGES,
        }
    }

    /// Whether an edge of `kind` is reported under this setting.
    pub fn matches(self, kind: EventType) -> bool {
        match (self, kind) {
            (EdgeDetect::Both, _) => true,
            (EdgeDetect::Rising, EventType::RisingEdge) => true,
            (EdgeDetect::Falling, EventType::FallingEdge) => true,
            _ => false,
        }
    }
}

impl RequestFlags {
    /// Validate a raw flag word.
    ///
    /// Unknown bits are rejected rather than passed to the driver.
    pub fn from_raw(bits: u32) -> Result<RequestFlags> {
        let flags = RequestFlags::from_bits(bits)
            .ok_or_else(|| request_err(RequestFailure::InvalidFlags(bits)))?;
        flags.validate()?;
        Ok(flags)
    }

    fn bias_count(self) -> u32 {
        (self & (RequestFlags::BIAS_DISABLE | RequestFlags::BIAS_PULL_DOWN | RequestFlags::BIAS_PULL_UP))
            .bits()
            .count_ones()
    }

    /// Check combinations that no request mode accepts.
    pub fn validate(self) -> Result<()> {
        if self.contains(RequestFlags::OPEN_DRAIN | RequestFlags::OPEN_SOURCE) {
            return Err(request_err(RequestFailure::ConflictingFlags(
                "open-drain and open-source are exclusive",
            )));
        }
        if self.bias_count() > 1 {
            return Err(request_err(RequestFailure::ConflictingFlags(
                "only one bias setting may be given",
            )));
        }
        Ok(())
    }

    /// Check the flags against the request mode.
    pub fn validate_for(self, mode: RequestMode) -> Result<()> {
        self.validate()?;
        let drive = self.intersects(RequestFlags::OPEN_DRAIN | RequestFlags::OPEN_SOURCE);
        if drive && mode != RequestMode::Output {
            return Err(request_err(RequestFailure::ConflictingFlags(
                "open-drain and open-source apply to outputs only",
            )));
        }
        Ok(())
    }

    /// Translate to the kernel's `GPIOHANDLE_REQUEST_*` word for `mode`.
    pub(crate) fn handle_flags(self, mode: RequestMode) -> HandleRequestFlags {
        let mut out = match mode {
            RequestMode::Output => HandleRequestFlags::OUTPUT,
            RequestMode::Input | RequestMode::Events(_) => HandleRequestFlags::INPUT,
        };
        let pairs = [
            (RequestFlags::ACTIVE_LOW, HandleRequestFlags::ACTIVE_LOW),
            (RequestFlags::OPEN_DRAIN, HandleRequestFlags::OPEN_DRAIN),
            (RequestFlags::OPEN_SOURCE, HandleRequestFlags::OPEN_SOURCE),
            (RequestFlags::BIAS_DISABLE, HandleRequestFlags::BIAS_DISABLE),
            (RequestFlags::BIAS_PULL_DOWN, HandleRequestFlags::BIAS_PULL_DOWN),
            (RequestFlags::BIAS_PULL_UP, HandleRequestFlags::BIAS_PULL_UP),
        ];
        for (named, kernel) in pairs.iter() {
            if self.contains(*named) {
                out |= *kernel;
            }
        }
        out
    }

    pub(crate) fn bias(self) -> Bias {
        if self.contains(RequestFlags::BIAS_DISABLE) {
            Bias::Disable
        } else if self.contains(RequestFlags::BIAS_PULL_UP) {
            Bias::PullUp
        } else if self.contains(RequestFlags::BIAS_PULL_DOWN) {
            Bias::PullDown
        } else {
            Bias::AsIs
        }
    }
}

/// Direction of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDirection {
    Input,
    Output,
}

/// Logical polarity of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveState {
    High,
    Low,
}

/// Internal pull resistor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    AsIs,
    Disable,
    PullUp,
    PullDown,
}

/// Kind of a recorded edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    RisingEdge,
    FallingEdge,
    Unknown,
}

impl LineDirection {
    pub fn code(self) -> u32 {
        match self {
            LineDirection::Input => 1,
            LineDirection::Output => 2,
        }
    }

    pub fn from_code(code: u32) -> Option<LineDirection> {
        match code {
            1 => Some(LineDirection::Input),
            2 => Some(LineDirection::Output),
            _ => None,
        }
    }
}

impl ActiveState {
    pub fn code(self) -> u32 {
        match self {
            ActiveState::High => 1,
            ActiveState::Low => 2,
        }
    }

    pub fn from_code(code: u32) -> Option<ActiveState> {
        match code {
            1 => Some(ActiveState::High),
            2 => Some(ActiveState::Low),
            _ => None,
        }
    }
}

impl Bias {
    pub fn code(self) -> u32 {
        match self {
            Bias::AsIs => 1,
            Bias::Disable => 2,
            Bias::PullUp => 3,
            Bias::PullDown => 4,
        }
    }

    pub fn from_code(code: u32) -> Option<Bias> {
        match code {
            1 => Some(Bias::AsIs),
            2 => Some(Bias::Disable),
            3 => Some(Bias::PullUp),
            4 => Some(Bias::PullDown),
            _ => None,
        }
    }
}

impl EventType {
    pub fn code(self) -> u32 {
        match self {
            EventType::RisingEdge => 1,
            EventType::FallingEdge => 2,
            EventType::Unknown => 0,
        }
    }

    /// Unrecognised codes map to [`EventType::Unknown`].
    pub fn from_code(code: u32) -> EventType {
        match code {
            1 => EventType::RisingEdge,
            2 => EventType::FallingEdge,
            _ => EventType::Unknown,
        }
    }
}

impl fmt::Display for LineDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LineDirection::Input => write!(f, "input"),
            LineDirection::Output => write!(f, "output"),
        }
    }
}

impl fmt::Display for ActiveState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ActiveState::High => write!(f, "high"),
            ActiveState::Low => write!(f, "low"),
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Bias::AsIs => write!(f, "as_is"),
            Bias::Disable => write!(f, "disable"),
            Bias::PullUp => write!(f, "pull_up"),
            Bias::PullDown => write!(f, "pull_down"),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            EventType::RisingEdge => write!(f, "rising_edge"),
            EventType::FallingEdge => write!(f, "falling_edge"),
            EventType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Line metadata as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfo {
    pub offset: u32,
    pub name: Option<String>,
    pub consumer: Option<String>,
    pub direction: LineDirection,
    pub active_state: ActiveState,
    pub bias: Bias,
    pub used: bool,
    pub open_drain: bool,
    pub open_source: bool,
}

impl LineInfo {
    /// Decode the kernel's `GPIOLINE_FLAG_*` word.
    pub(crate) fn from_kernel(
        offset: u32,
        flags: LineInfoFlags,
        name: String,
        consumer: String,
    ) -> LineInfo {
        let bias = if flags.contains(LineInfoFlags::BIAS_DISABLE) {
            Bias::Disable
        } else if flags.contains(LineInfoFlags::BIAS_PULL_UP) {
            Bias::PullUp
        } else if flags.contains(LineInfoFlags::BIAS_PULL_DOWN) {
            Bias::PullDown
        } else {
            Bias::AsIs
        };
        LineInfo {
            offset,
            name: Some(name).filter(|s| !s.is_empty()),
            consumer: Some(consumer).filter(|s| !s.is_empty()),
            direction: if flags.contains(LineInfoFlags::IS_OUT) {
                LineDirection::Output
            } else {
                LineDirection::Input
            },
            active_state: if flags.contains(LineInfoFlags::ACTIVE_LOW) {
                ActiveState::Low
            } else {
                ActiveState::High
            },
            bias,
            used: flags.contains(LineInfoFlags::KERNEL),
            open_drain: flags.contains(LineInfoFlags::OPEN_DRAIN),
            open_source: flags.contains(LineInfoFlags::OPEN_SOURCE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn is_conflict(result: Result<()>) -> bool {
        matches!(
            result.unwrap_err().kind(),
            ErrorKind::RequestFailed(RequestFailure::ConflictingFlags(_))
        )
    }

    #[test]
    fn raw_flags_with_unknown_bits_are_rejected() {
        let err = RequestFlags::from_raw(1 << 9).unwrap_err();
        match err.kind() {
            ErrorKind::RequestFailed(RequestFailure::InvalidFlags(bits)) => assert_eq!(*bits, 1 << 9),
            other => panic!("unexpected error kind {:?}", other),
        }
    }

    #[test]
    fn raw_flags_round_trip_named_bits() {
        let flags = RequestFlags::from_raw(0b100100).unwrap();
        assert_eq!(flags, RequestFlags::ACTIVE_LOW | RequestFlags::BIAS_PULL_UP);
    }

    #[test]
    fn exclusive_drive_modes() {
        let f = RequestFlags::OPEN_DRAIN | RequestFlags::OPEN_SOURCE;
        assert!(is_conflict(f.validate()));
    }

    #[test]
    fn single_bias_only() {
        let f = RequestFlags::BIAS_PULL_UP | RequestFlags::BIAS_DISABLE;
        assert!(is_conflict(f.validate()));
    }

    #[test]
    fn drive_modes_need_output() {
        let f = RequestFlags::OPEN_DRAIN;
        assert!(f.validate_for(RequestMode::Output).is_ok());
        assert!(f.validate_for(RequestMode::Input).is_err());
        assert!(f.validate_for(RequestMode::Events(EdgeDetect::Both)).is_err());
    }

    #[test]
    fn kernel_translation() {
        let f = RequestFlags::ACTIVE_LOW | RequestFlags::OPEN_DRAIN | RequestFlags::BIAS_PULL_DOWN;
        assert_eq!(
            f.handle_flags(RequestMode::Output),
            HandleRequestFlags::OUTPUT
                | HandleRequestFlags::ACTIVE_LOW
                | HandleRequestFlags::OPEN_DRAIN
                | HandleRequestFlags::BIAS_PULL_DOWN
        );
        assert_eq!(
            RequestFlags::empty().handle_flags(RequestMode::Events(EdgeDetect::Rising)),
            HandleRequestFlags::INPUT
        );
    }

    #[test]
    fn codes_and_names() {
        assert_eq!(LineDirection::from_code(2), Some(LineDirection::Output));
        assert_eq!(LineDirection::from_code(7), None);
        assert_eq!(Bias::from_code(Bias::PullDown.code()), Some(Bias::PullDown));
        assert_eq!(ActiveState::Low.to_string(), "low");
        assert_eq!(EventType::from_code(9), EventType::Unknown);
        assert_eq!(EventType::FallingEdge.to_string(), "falling_edge");
        assert_eq!(Bias::PullUp.to_string(), "pull_up");
    }

    #[test]
    fn kernel_line_flags_decode() {
        let info = LineInfo::from_kernel(
            3,
            LineInfoFlags::KERNEL | LineInfoFlags::IS_OUT | LineInfoFlags::ACTIVE_LOW | LineInfoFlags::BIAS_PULL_UP,
            "LED".to_owned(),
            String::new(),
        );
        assert_eq!(info.direction, LineDirection::Output);
        assert_eq!(info.active_state, ActiveState::Low);
        assert_eq!(info.bias, Bias::PullUp);
        assert!(info.used);
        assert_eq!(info.name.as_deref(), Some("LED"));
        assert_eq!(info.consumer, None);
    }

    #[test]
    fn edge_filter() {
        assert!(EdgeDetect::Both.matches(EventType::FallingEdge));
        assert!(EdgeDetect::Rising.matches(EventType::RisingEdge));
        assert!(!EdgeDetect::Rising.matches(EventType::FallingEdge));
    }
}

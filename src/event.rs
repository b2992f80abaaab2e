// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::time::Duration;

use crate::flags::EventType;

/// One edge transition read from a line armed for events.
///
/// The timestamp is relative to an epoch chosen by the driver, so only
/// differences between events of the same controller are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEvent {
    event_type: EventType,
    timestamp: Duration,
}

impl LineEvent {
    pub fn new(event_type: EventType, timestamp: Duration) -> LineEvent {
        LineEvent {
            event_type,
            timestamp,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Timestamp as seconds plus the nanosecond fraction.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp.as_secs() as f64 + f64::from(self.timestamp.subsec_nanos()) / 1e9
    }
}

// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Linux GPIO character device uAPI v1 (`include/uapi/linux/gpio.h`).

#![allow(non_camel_case_types)]

use bitflags::bitflags;
use nix::{ioctl_read, ioctl_readwrite};

pub const GPIOHANDLES_MAX: usize = 64;
pub const GPIO_MAX_NAME_SIZE: usize = 32;

bitflags! {
    /// `GPIOLINE_FLAG_*`, as reported by the line-info ioctl.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineInfoFlags: u32 {
        const KERNEL = (1 << 0);
        const IS_OUT = (1 << 1);
        const ACTIVE_LOW = (1 << 2);
        const OPEN_DRAIN = (1 << 3);
        const OPEN_SOURCE = (1 << 4);
        const BIAS_PULL_UP = (1 << 5);
        const BIAS_PULL_DOWN = (1 << 6);
        const BIAS_DISABLE = (1 << 7);
    }
}

bitflags! {
    /// `GPIOHANDLE_REQUEST_*`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HandleRequestFlags: u32 {
        const INPUT = (1 << 0);
        const OUTPUT = (1 << 1);
        const ACTIVE_LOW = (1 << 2);
        const OPEN_DRAIN = (1 << 3);
        const OPEN_SOURCE = (1 << 4);
        const BIAS_PULL_UP = (1 << 5);
        const BIAS_PULL_DOWN = (1 << 6);
        const BIAS_DISABLE = (1 << 7);
    }
}

bitflags! {
    /// `GPIOEVENT_REQUEST_*`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventRequestFlags: u32 {
        const RISING_EDGE = (1 << 0);
        const FALLING_EDGE = (1 << 1);
        const BOTH_EDGES = Self::RISING_EDGE.bits() | Self::FALLING_EDGE.bits();
    }
}

pub const GPIOEVENT_EVENT_RISING_EDGE: u32 = 0x01;
pub const GPIOEVENT_EVENT_FALLING_EDGE: u32 = 0x02;

#[repr(C)]
pub struct gpiochip_info {
    pub name: [libc::c_char; GPIO_MAX_NAME_SIZE],
    pub label: [libc::c_char; GPIO_MAX_NAME_SIZE],
    pub lines: u32,
}

#[repr(C)]
pub struct gpioline_info {
    pub line_offset: u32,
    pub flags: u32,
    pub name: [libc::c_char; GPIO_MAX_NAME_SIZE],
    pub consumer: [libc::c_char; GPIO_MAX_NAME_SIZE],
}

#[repr(C)]
pub struct gpiohandle_request {
    pub lineoffsets: [u32; GPIOHANDLES_MAX],
    pub flags: u32,
    pub default_values: [u8; GPIOHANDLES_MAX],
    pub consumer_label: [libc::c_char; GPIO_MAX_NAME_SIZE],
    pub lines: u32,
    pub fd: libc::c_int,
}

#[repr(C)]
pub struct gpiohandle_data {
    pub values: [u8; GPIOHANDLES_MAX],
}

#[repr(C)]
pub struct gpioevent_request {
    pub lineoffset: u32,
    pub handleflags: u32,
    pub eventflags: u32,
    pub consumer_label: [libc::c_char; GPIO_MAX_NAME_SIZE],
    pub fd: libc::c_int,
}

#[repr(C)]
pub struct gpioevent_data {
    pub timestamp: u64,
    pub id: u32,
}

/// Copy `label` into a fixed-size, NUL-terminated kernel string field,
/// truncating if needed.
pub fn fill_label(dst: &mut [libc::c_char; GPIO_MAX_NAME_SIZE], label: &str) {
    for (slot, byte) in dst
        .iter_mut()
        .zip(label.bytes().take(GPIO_MAX_NAME_SIZE - 1))
    {
        *slot = byte as libc::c_char;
    }
}

/// Read a kernel string field that may lack a terminating NUL.
pub fn label_string(src: &[libc::c_char; GPIO_MAX_NAME_SIZE]) -> String {
    let bytes: Vec<u8> = src
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

ioctl_read!(gpio_get_chipinfo_ioctl, 0xB4, 0x01, gpiochip_info);
ioctl_readwrite!(gpio_get_lineinfo_ioctl, 0xB4, 0x02, gpioline_info);
ioctl_readwrite!(gpio_get_linehandle_ioctl, 0xB4, 0x03, gpiohandle_request);
ioctl_readwrite!(gpio_get_lineevent_ioctl, 0xB4, 0x04, gpioevent_request);

ioctl_readwrite!(gpiohandle_get_line_values_ioctl, 0xB4, 0x08, gpiohandle_data);
ioctl_readwrite!(gpiohandle_set_line_values_ioctl, 0xB4, 0x09, gpiohandle_data);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_truncated_and_terminated() {
        let mut field = [0 as libc::c_char; GPIO_MAX_NAME_SIZE];
        fill_label(&mut field, &"x".repeat(40));
        assert_eq!(field[GPIO_MAX_NAME_SIZE - 1], 0);
        assert_eq!(label_string(&field).len(), GPIO_MAX_NAME_SIZE - 1);
    }

    #[test]
    fn unterminated_field_reads_whole_buffer() {
        let field = [b'a' as libc::c_char; GPIO_MAX_NAME_SIZE];
        assert_eq!(label_string(&field), "a".repeat(GPIO_MAX_NAME_SIZE));
    }

    #[test]
    fn event_record_matches_kernel_size() {
        assert_eq!(std::mem::size_of::<gpioevent_data>(), 16);
    }
}

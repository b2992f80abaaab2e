// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Backend for the Linux GPIO character devices (`/dev/gpiochipN`), using
//! the v1 ioctl interface.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::mem;
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use nix::fcntl::{fcntl, FcntlArg, OFlag};

use crate::backend::{Backend, ChipDevice, ChipInfo, LineRequest, RequestSpec};
use crate::event::LineEvent;
use crate::ffi;
use crate::flags::{EventType, LineInfo, RequestMode};
use crate::timing;

const CHIP_PREFIX: &str = "gpiochip";

/// Kernel GPIO backend.
#[derive(Debug, Clone)]
pub struct CdevBackend {
    dev_dir: PathBuf,
}

impl Default for CdevBackend {
    fn default() -> CdevBackend {
        CdevBackend::with_dev_dir("/dev")
    }
}

impl CdevBackend {
    /// Look for controllers in `dir` instead of `/dev`.
    pub fn with_dev_dir<P: Into<PathBuf>>(dir: P) -> CdevBackend {
        CdevBackend {
            dev_dir: dir.into(),
        }
    }

    pub fn dev_dir(&self) -> &Path {
        &self.dev_dir
    }
}

fn chip_number(name: &str) -> Option<u32> {
    name.strip_prefix(CHIP_PREFIX)?.parse().ok()
}

impl Backend for CdevBackend {
    fn open(&self, name: &str) -> io::Result<Box<dyn ChipDevice>> {
        let path = if name.contains('/') {
            PathBuf::from(name)
        } else {
            self.dev_dir.join(name)
        };
        Ok(Box::new(CdevChip::open(&path)?))
    }

    fn open_by_number(&self, number: u32) -> io::Result<Box<dyn ChipDevice>> {
        let path = self.dev_dir.join(format!("{}{}", CHIP_PREFIX, number));
        Ok(Box::new(CdevChip::open(&path)?))
    }

    fn enumerate(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dev_dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if chip_number(&name).is_some() {
                names.push(name);
            }
        }
        names.sort_by_key(|name| chip_number(name));
        Ok(names)
    }

    fn version(&self) -> String {
        format!("{} (gpio uapi v1)", env!("CARGO_PKG_VERSION"))
    }
}

#[derive(Debug)]
struct CdevChip {
    file: File,
    info: ChipInfo,
}

impl CdevChip {
    fn open(path: &Path) -> io::Result<CdevChip> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut info = ffi::gpiochip_info {
            name: [0; ffi::GPIO_MAX_NAME_SIZE],
            label: [0; ffi::GPIO_MAX_NAME_SIZE],
            lines: 0,
        };
        // A file that does not answer this ioctl is not a GPIO controller.
        unsafe { ffi::gpio_get_chipinfo_ioctl(file.as_raw_fd(), &mut info) }?;

        Ok(CdevChip {
            file,
            info: ChipInfo {
                name: ffi::label_string(&info.name),
                label: ffi::label_string(&info.label),
                num_lines: info.lines,
            },
        })
    }

    fn request_handle(&self, spec: &RequestSpec) -> io::Result<File> {
        if spec.offsets.len() > ffi::GPIOHANDLES_MAX {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        let mut request = ffi::gpiohandle_request {
            lineoffsets: [0; ffi::GPIOHANDLES_MAX],
            flags: spec.flags.handle_flags(spec.mode).bits(),
            default_values: [0; ffi::GPIOHANDLES_MAX],
            consumer_label: [0; ffi::GPIO_MAX_NAME_SIZE],
            lines: spec.offsets.len() as u32,
            fd: 0,
        };
        request.lineoffsets[..spec.offsets.len()].copy_from_slice(spec.offsets);
        for (slot, &value) in request.default_values.iter_mut().zip(spec.default_values) {
            *slot = (value != 0) as u8;
        }
        ffi::fill_label(&mut request.consumer_label, spec.consumer);

        unsafe { ffi::gpio_get_linehandle_ioctl(self.file.as_raw_fd(), &mut request) }?;
        Ok(unsafe { File::from_raw_fd(request.fd) })
    }

    fn request_events(&self, spec: &RequestSpec, offset: u32) -> io::Result<File> {
        let edges = match spec.mode {
            RequestMode::Events(edges) => edges,
            _ => return Err(io::Error::from_raw_os_error(libc::EINVAL)),
        };
        let mut request = ffi::gpioevent_request {
            lineoffset: offset,
            handleflags: spec.flags.handle_flags(spec.mode).bits(),
            eventflags: edges.event_flags().bits(),
            consumer_label: [0; ffi::GPIO_MAX_NAME_SIZE],
            fd: 0,
        };
        ffi::fill_label(&mut request.consumer_label, spec.consumer);

        unsafe { ffi::gpio_get_lineevent_ioctl(self.file.as_raw_fd(), &mut request) }?;
        let file = unsafe { File::from_raw_fd(request.fd) };

        // Reads must fail rather than block when no event is queued.
        let fd = file.as_raw_fd();
        let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
        fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
        Ok(file)
    }
}

impl ChipDevice for CdevChip {
    fn info(&self) -> &ChipInfo {
        &self.info
    }

    fn line_info(&self, offset: u32) -> io::Result<LineInfo> {
        let mut line_info = ffi::gpioline_info {
            line_offset: offset,
            flags: 0,
            name: [0; ffi::GPIO_MAX_NAME_SIZE],
            consumer: [0; ffi::GPIO_MAX_NAME_SIZE],
        };
        unsafe { ffi::gpio_get_lineinfo_ioctl(self.file.as_raw_fd(), &mut line_info) }?;

        Ok(LineInfo::from_kernel(
            offset,
            ffi::LineInfoFlags::from_bits_truncate(line_info.flags),
            ffi::label_string(&line_info.name),
            ffi::label_string(&line_info.consumer),
        ))
    }

    fn request(&self, spec: &RequestSpec) -> io::Result<Arc<dyn LineRequest>> {
        let file = match (spec.mode, spec.offsets) {
            (RequestMode::Events(_), &[offset]) => self.request_events(spec, offset)?,
            // uAPI v1 arms events on one line per request.
            (RequestMode::Events(_), _) => return Err(io::Error::from_raw_os_error(libc::EINVAL)),
            _ => self.request_handle(spec)?,
        };
        Ok(Arc::new(CdevRequest {
            file,
            num_lines: spec.offsets.len(),
            events: spec.mode.is_events(),
        }))
    }
}

#[derive(Debug)]
struct CdevRequest {
    file: File,
    num_lines: usize,
    events: bool,
}

impl LineRequest for CdevRequest {
    fn get_values(&self, values: &mut [u8]) -> io::Result<()> {
        let mut data = ffi::gpiohandle_data {
            values: [0; ffi::GPIOHANDLES_MAX],
        };
        unsafe { ffi::gpiohandle_get_line_values_ioctl(self.file.as_raw_fd(), &mut data) }?;
        let n = values.len().min(self.num_lines);
        values[..n].copy_from_slice(&data.values[..n]);
        Ok(())
    }

    fn set_values(&self, values: &[u8]) -> io::Result<()> {
        if self.events {
            return Err(io::Error::from_raw_os_error(libc::EPERM));
        }
        let mut data = ffi::gpiohandle_data {
            values: [0; ffi::GPIOHANDLES_MAX],
        };
        for (slot, &value) in data.values.iter_mut().zip(values.iter().take(self.num_lines)) {
            *slot = (value != 0) as u8;
        }
        unsafe { ffi::gpiohandle_set_line_values_ioctl(self.file.as_raw_fd(), &mut data) }?;
        Ok(())
    }

    fn wait_event(&self, timeout: Option<Duration>) -> io::Result<bool> {
        if !self.events {
            return Err(io::Error::from_raw_os_error(libc::EPERM));
        }
        timing::wait_readable(&self.file, timeout)
    }

    fn read_event(&self) -> io::Result<LineEvent> {
        if !self.events {
            return Err(io::Error::from_raw_os_error(libc::EPERM));
        }
        let mut buf = [0u8; mem::size_of::<ffi::gpioevent_data>()];
        let n = (&self.file).read(&mut buf)?;
        if n != buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "short read of GPIO event",
            ));
        }

        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&buf[0..8]);
        let mut id = [0u8; 4];
        id.copy_from_slice(&buf[8..12]);

        let event_type = match u32::from_ne_bytes(id) {
            ffi::GPIOEVENT_EVENT_RISING_EDGE => EventType::RisingEdge,
            ffi::GPIOEVENT_EVENT_FALLING_EDGE => EventType::FallingEdge,
            _ => EventType::Unknown,
        };
        Ok(LineEvent::new(
            event_type,
            Duration::from_nanos(u64::from_ne_bytes(timestamp)),
        ))
    }

    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

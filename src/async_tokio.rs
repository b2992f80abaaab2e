// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Wrapper for asynchronous programming using Tokio.

use futures::ready;
use futures::stream::Stream;
use futures::task::{Context, Poll};
use tokio::io::unix::AsyncFd;

use std::os::unix::io::{AsRawFd, RawFd};
use std::pin::Pin;
use std::sync::Arc;

use super::backend::LineRequest;
use super::errors::{io_err, Operation};
use super::{Line, LineEvent, Result};

/// Holds the event request so its descriptor outlives the registration,
/// even if the controller is closed meanwhile.
struct RequestFd(Arc<dyn LineRequest>);

impl AsRawFd for RequestFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

/// Wrapper around a [`Line`] armed for edge events which implements a
/// `futures::stream::Stream` of its events.
///
/// # Example
///
/// The following example waits for state changes on an input line.
///
/// ```no_run
/// use futures::stream::StreamExt;
/// use gpio_handles::{AsyncLineEventHandle, Chip, RequestFlags};
///
/// async fn print_events(offset: u32) -> gpio_handles::Result<()> {
///     let chip = Chip::open("gpiochip0")?;
///     let mut line = chip.get_line(offset)?;
///     line.request_both_edges_events("gpioevents", RequestFlags::empty())?;
///     let mut events = AsyncLineEventHandle::new(line)?;
///
///     while let Some(event) = events.next().await {
///         println!("{:?}", event?);
///     }
///
///     Ok(())
/// }
///
/// # #[tokio::main]
/// # async fn main() {
/// #     print_events(42).await.unwrap();
/// # }
/// ```
///
/// Closing the controller while the stream is alive makes it yield
/// [`ClosedResource`](crate::ErrorKind::ClosedResource) errors; the
/// descriptor itself stays open until the handle is dropped.
pub struct AsyncLineEventHandle {
    fd: AsyncFd<RequestFd>,
    line: Line,
}

impl AsyncLineEventHandle {
    /// Wraps the specified `Line`, which must be requested for edge events.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(line: Line) -> Result<AsyncLineEventHandle> {
        let request = line.event_request()?;
        Ok(AsyncLineEventHandle {
            fd: AsyncFd::new(RequestFd(request)).map_err(|err| io_err(Operation::WaitEvent, err))?,
            line,
        })
    }

    /// Give back the wrapped line.
    pub fn into_inner(self) -> Line {
        let AsyncLineEventHandle { fd, line } = self;
        drop(fd);
        line
    }
}

impl Stream for AsyncLineEventHandle {
    type Item = Result<LineEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let this: &Self = &self;
        loop {
            let mut guard = match ready!(this.fd.poll_read_ready(cx)) {
                Ok(guard) => guard,
                Err(err) => return Poll::Ready(Some(Err(io_err(Operation::WaitEvent, err)))),
            };
            match this.line.event_read() {
                Ok(event) => return Poll::Ready(Some(Ok(event))),
                Err(ref err) if err.is_would_block() => guard.clear_ready(),
                Err(err) => return Poll::Ready(Some(Err(err))),
            }
        }
    }
}

impl AsRef<Line> for AsyncLineEventHandle {
    fn as_ref(&self) -> &Line {
        &self.line
    }
}

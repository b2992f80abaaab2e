// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use gpio_handles::{Chip, Line, RequestFlags};
use nix::poll::*;
use quicli::prelude::*;
use std::os::unix::io::BorrowedFd;
use structopt::StructOpt;

type PollEventFlags = nix::poll::PollFlags;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The gpiochip device (e.g. gpiochip0 or 0)
    chip: String,
    /// The offset of the GPIO lines for the provided chip
    lines: Vec<u32>,
}

fn do_main(args: Cli) -> anyhow::Result<()> {
    let chip = Chip::open(&args.chip)?;

    // Arm each line to monitor for edge events.
    let mut lines: Vec<Line> = Vec::with_capacity(args.lines.len());
    for off in args.lines {
        let mut line = chip.get_line(off)?;
        line.request_both_edges_events("monitor", RequestFlags::empty())?;
        lines.push(line);
    }

    // The descriptors stay open while `lines` is alive and the chip is open.
    let fds = lines
        .iter()
        .map(|line| {
            line.event_get_fd()
                .map(|fd| unsafe { BorrowedFd::borrow_raw(fd) })
        })
        .collect::<gpio_handles::Result<Vec<_>>>()?;

    loop {
        // Create a vector of file descriptors for polling
        let mut pollfds: Vec<PollFd> = fds
            .iter()
            .map(|fd| PollFd::new(fd, PollEventFlags::POLLIN | PollEventFlags::POLLPRI))
            .collect();

        // poll for an event on any of the lines
        if poll(&mut pollfds, -1)? == 0 {
            println!("Timeout?!?");
            continue;
        }
        for (pollfd, line) in pollfds.iter().zip(&lines) {
            let offset = line.offset()?;
            if let Some(revts) = pollfd.revents() {
                if revts.contains(PollEventFlags::POLLIN) {
                    let event = line.event_read()?;
                    println!("[{}] {:?}", offset, event);

                    // The level can be inferred from the event, but the line
                    // can be read directly too.
                    println!("    {}", line.get_value()?);
                } else if revts.contains(PollEventFlags::POLLPRI) {
                    println!("[{}] Got a POLLPRI", offset);
                }
            }
        }
    }
}

fn main() -> CliResult {
    let args = Cli::from_args();
    do_main(args).or_else(|e| {
        error!("{:?}", e);
        Ok(())
    })
}

// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use gpio_handles::{timing, Chip, RequestFlags};
use quicli::prelude::*;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The gpiochip device (e.g. gpiochip0 or 0)
    chip: String,
    /// The offset of the GPIO line for the provided chip
    line: u32,
    /// Seconds to wait for each event; negative waits forever
    #[structopt(long = "timeout", default_value = "-1", allow_hyphen_values = true)]
    timeout: f64,
}

fn do_main(args: Cli) -> std::result::Result<(), gpio_handles::Error> {
    let chip = Chip::open(&args.chip)?;
    let mut line = chip.get_line(args.line)?;
    line.request_both_edges_events("gpioevents", RequestFlags::empty())?;

    let timeout = timing::timeout_from_secs(args.timeout);
    while line.event_wait(timeout)? {
        while let Ok(event) = line.event_read() {
            println!("{} {:.9}", event.event_type(), event.timestamp_secs());
        }
    }
    println!("Timed out");

    Ok(())
}

fn main() -> CliResult {
    let args = Cli::from_args();
    do_main(args).or_else(|e| {
        error!("{:?}", e);
        Ok(())
    })
}

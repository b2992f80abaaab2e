// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use gpio_handles::{sleep, Chip, RequestFlags};
use quicli::prelude::*;
use std::time::Instant;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The gpiochip device (e.g. gpiochip0 or 0)
    chip: String,
    /// The offset of the GPIO line for the provided chip
    line: u32,
    /// Half period in seconds
    period: f64,
    /// Seconds over which to blink
    duration: f64,
}

fn do_main(args: Cli) -> std::result::Result<(), gpio_handles::Error> {
    let chip = Chip::open(&args.chip)?;

    // NOTE: we set the default value to the desired state so
    // setting it separately is not required
    let mut line = chip.get_line(args.line)?;
    line.request_output("blinky", 1, RequestFlags::empty())?;

    let start_time = Instant::now();
    while start_time.elapsed().as_secs_f64() < args.duration {
        sleep(args.period);
        line.set_value(0)?;
        sleep(args.period);
        line.set_value(1)?;
    }

    Ok(())
}

fn main() -> CliResult {
    let args = Cli::from_args();
    do_main(args).or_else(|e| {
        error!("{:?}", e);
        Ok(())
    })
}

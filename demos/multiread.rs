// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use gpio_handles::{Chip, RequestFlags};
use quicli::prelude::*;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The gpiochip device (e.g. gpiochip0 or 0)
    chip: String,
    /// The offset of the GPIO lines for the provided chip
    lines: Vec<u32>,
    /// Enable the pull-down resistor on every line
    #[structopt(long = "pull-down")]
    pull_down: bool,
}

fn do_main(args: Cli) -> std::result::Result<(), gpio_handles::Error> {
    let chip = Chip::open(&args.chip)?;
    let flags = if args.pull_down {
        RequestFlags::BIAS_PULL_DOWN
    } else {
        RequestFlags::empty()
    };
    let mut lines = chip.get_lines(&args.lines)?;
    lines.request_input("multiread", flags)?;
    println!("Values: {:?}", lines.get_values()?);

    Ok(())
}

fn main() -> CliResult {
    let args = Cli::from_args();
    do_main(args).or_else(|e| {
        error!("{:?}", e);
        Ok(())
    })
}

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
    /// The offset of the GPIO line for the provided chip
    line: u32,
    /// The value to write
    value: u8,
}

fn do_main(args: Cli) -> std::result::Result<(), gpio_handles::Error> {
    let chip = Chip::open(&args.chip)?;

    // NOTE: the default value is the desired state, so setting it
    // separately is not required. The line stays driven only while the
    // `Line` is alive; dropping it releases the line.
    let mut line = chip.get_line(args.line)?;
    line.request_output("driveoutput", args.value, RequestFlags::empty())?;

    println!("Output being driven... Enter to exit");
    let mut buf = String::new();
    if let Err(e) = ::std::io::stdin().read_line(&mut buf) {
        println!("Failed to read stdin: {}", e);
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

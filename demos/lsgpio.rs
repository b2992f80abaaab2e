// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! List every GPIO controller and the state of its lines.

use gpio_handles::{chips, LineDirection};

fn main() {
    let chip_iterator = match chips() {
        Some(chips) => chips,
        None => {
            println!("Failed to list GPIO chips");
            return;
        }
    };
    println!("gpio-handles {}", gpio_handles::version());

    for chip in chip_iterator {
        let (name, label, num_lines) = match (chip.name(), chip.label(), chip.num_lines()) {
            (Ok(name), Ok(label), Ok(num_lines)) => (name, label, num_lines),
            _ => continue,
        };
        println!("GPIO chip: {}, \"{}\", {} GPIO Lines", name, label, num_lines);

        for offset in 0..num_lines {
            let line = match chip.get_line(offset) {
                Ok(line) => line,
                Err(e) => {
                    println!("\tError getting line {}: {}", offset, e);
                    continue;
                }
            };
            match line.info() {
                Ok(info) => {
                    let mut flags = vec![];

                    if info.used {
                        flags.push("used".to_owned());
                    }
                    if info.direction == LineDirection::Output {
                        flags.push("output".to_owned());
                    }
                    flags.push(format!("active-{}", info.active_state));
                    if info.open_drain {
                        flags.push("open-drain".to_owned());
                    }
                    if info.open_source {
                        flags.push("open-source".to_owned());
                    }
                    flags.push(format!("bias={}", info.bias));

                    println!(
                        "\tline {lineno:>3}: {name} {consumer} [{usage}]",
                        lineno = info.offset,
                        name = info.name.as_deref().unwrap_or("unnamed"),
                        consumer = info.consumer.as_deref().unwrap_or("unused"),
                        usage = flags.join(" "),
                    );
                }
                Err(e) => println!("\tError getting line {}: {}", offset, e),
            }
        }
    }
}

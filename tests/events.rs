// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::os::unix::io::BorrowedFd;
use std::thread;
use std::time::{Duration, Instant};

use gpio_handles::sim::{SimBackend, SimChip};
use gpio_handles::timing;
use gpio_handles::{Chip, ErrorKind, EventType, Operation, RequestFlags};
use nix::poll::{poll, PollFd, PollFlags};

fn open() -> (SimChip, Chip) {
    let sim = SimChip::new("gpiochip0", "sim", 8);
    let backend = SimBackend::new().with_chip(sim.clone());
    let chip = Chip::open_with(&backend, "gpiochip0").unwrap();
    (sim, chip)
}

#[test]
fn wait_times_out_without_events() {
    let (_sim, chip) = open();
    let mut line = chip.get_line(3).unwrap();
    line.request_both_edges_events("test", RequestFlags::empty())
        .unwrap();

    let start = Instant::now();
    assert!(!line.event_wait(Some(Duration::from_millis(50))).unwrap());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(40));
    assert!(elapsed < Duration::from_secs(2));
}

#[test]
fn edges_are_read_in_order() {
    let (sim, chip) = open();
    let mut line = chip.get_line(3).unwrap();
    line.request_both_edges_events("test", RequestFlags::empty())
        .unwrap();

    sim.set_pull(3, 1);
    sim.set_pull(3, 0);
    assert!(line.event_wait(Some(Duration::from_millis(0))).unwrap());

    let rising = line.event_read().unwrap();
    let falling = line.event_read().unwrap();
    assert_eq!(rising.event_type(), EventType::RisingEdge);
    assert_eq!(falling.event_type(), EventType::FallingEdge);
    assert!(falling.timestamp() >= rising.timestamp());

    let empty = line.event_read().unwrap_err();
    assert!(empty.is_would_block());
    assert!(!line.event_wait(Some(Duration::from_millis(0))).unwrap());
}

#[test]
fn rising_only_ignores_falling_edges() {
    let (sim, chip) = open();
    let mut line = chip.get_line(0).unwrap();
    line.request_rising_edge_events("test", RequestFlags::empty())
        .unwrap();

    sim.set_pull(0, 1);
    sim.set_pull(0, 0);
    sim.set_pull(0, 1);
    assert_eq!(line.event_read().unwrap().event_type(), EventType::RisingEdge);
    assert_eq!(line.event_read().unwrap().event_type(), EventType::RisingEdge);
    assert!(line.event_read().unwrap_err().is_would_block());
}

#[test]
fn falling_edge_with_active_low() {
    let (sim, chip) = open();
    sim.set_pull(5, 1);
    let mut line = chip.get_line(5).unwrap();
    // Physically high reads as logical 0, so dropping the pull is a
    // logical rising edge.
    line.request_falling_edge_events("test", RequestFlags::ACTIVE_LOW)
        .unwrap();
    assert_eq!(line.get_value().unwrap(), 0);

    sim.set_pull(5, 0);
    assert!(!line.event_wait(Some(Duration::from_millis(0))).unwrap());
    sim.set_pull(5, 1);
    assert_eq!(line.event_read().unwrap().event_type(), EventType::FallingEdge);
}

#[test]
fn wait_wakes_on_event_from_another_thread() {
    let (sim, chip) = open();
    let mut line = chip.get_line(2).unwrap();
    line.request_both_edges_events("test", RequestFlags::empty())
        .unwrap();

    let pusher = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        sim.set_pull(2, 1);
    });
    assert!(line.event_wait(Some(Duration::from_secs(5))).unwrap());
    assert_eq!(line.event_read().unwrap().event_type(), EventType::RisingEdge);
    pusher.join().unwrap();
}

#[test]
fn wait_until_past_deadline_returns_immediately() {
    let (_sim, chip) = open();
    let mut line = chip.get_line(1).unwrap();
    line.request_both_edges_events("test", RequestFlags::empty())
        .unwrap();
    assert!(!line.event_wait_until(Instant::now()).unwrap());
}

#[test]
fn event_fd_polls_readable() {
    let (sim, chip) = open();
    let mut line = chip.get_line(4).unwrap();
    line.request_both_edges_events("test", RequestFlags::empty())
        .unwrap();
    let fd = line.event_get_fd().unwrap();
    assert!(fd >= 0);

    // The line keeps the descriptor open for the rest of the test.
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    let mut fds = [PollFd::new(&borrowed, PollFlags::POLLIN)];
    assert_eq!(poll(&mut fds, 0).unwrap(), 0);
    sim.set_pull(4, 1);
    assert_eq!(poll(&mut fds, 0).unwrap(), 1);
    assert!(fds[0].revents().unwrap().contains(PollFlags::POLLIN));
    line.event_read().unwrap();
}

#[test]
fn event_ops_need_an_event_request() {
    let (_sim, chip) = open();
    let mut line = chip.get_line(6).unwrap();
    line.request_input("test", RequestFlags::empty()).unwrap();

    match line.event_read().unwrap_err().kind() {
        ErrorKind::IoFailure { op, cause } => {
            assert_eq!(*op, Operation::ReadEvent);
            assert_eq!(cause.raw_os_error(), Some(libc::EPERM));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(line.event_wait(Some(Duration::from_millis(0))).is_err());
    assert!(line.event_get_fd().is_err());
}

#[test]
fn event_line_still_reads_its_level() {
    let (sim, chip) = open();
    let mut line = chip.get_line(7).unwrap();
    line.request_both_edges_events("test", RequestFlags::empty())
        .unwrap();
    sim.set_pull(7, 1);
    assert_eq!(line.get_value().unwrap(), 1);
}

#[test]
fn released_event_line() {
    let (_sim, chip) = open();
    let mut line = chip.get_line(1).unwrap();
    line.request_both_edges_events("test", RequestFlags::empty())
        .unwrap();
    line.release();
    assert!(matches!(
        line.event_wait(Some(Duration::from_millis(0))).unwrap_err().kind(),
        ErrorKind::ReleasedResource
    ));
    assert!(matches!(line.event_read().unwrap_err().kind(), ErrorKind::ReleasedResource));
}

#[test]
fn huge_timeouts_wait_without_bound() {
    let (sim, chip) = open();
    let mut line = chip.get_line(0).unwrap();
    line.request_both_edges_events("test", RequestFlags::empty())
        .unwrap();
    sim.set_pull(0, 1);

    assert!(line.event_wait(Some(Duration::MAX)).unwrap());
    assert!(line.event_wait(timing::timeout_from_secs(1e19)).unwrap());
    assert!(line
        .event_wait(Some(Duration::from_secs(u64::MAX / 2)))
        .unwrap());
    assert_eq!(line.event_read().unwrap().event_type(), EventType::RisingEdge);
}

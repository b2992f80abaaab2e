// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use gpio_handles::sim::{SimBackend, SimChip};
use gpio_handles::{Chip, ErrorKind, RequestFailure, RequestFlags, MAX_REQUEST_LINES};

fn open(num_lines: u32) -> (SimChip, Chip) {
    let sim = SimChip::new("gpiochip0", "sim", num_lines);
    let backend = SimBackend::new().with_chip(sim.clone());
    let chip = Chip::open_with(&backend, "gpiochip0").unwrap();
    (sim, chip)
}

#[test]
fn read_three_inputs() {
    let (_sim, chip) = open(8);
    let mut lines = chip.get_lines(&[0, 1, 2]).unwrap();
    lines.request_input("multiread", RequestFlags::empty()).unwrap();
    assert_eq!(lines.get_values().unwrap(), vec![0, 0, 0]);
}

#[test]
fn values_follow_group_order() {
    let (sim, chip) = open(8);
    let mut lines = chip.get_lines(&[5, 1, 3]).unwrap();
    lines.request_input("test", RequestFlags::empty()).unwrap();
    sim.set_pull(5, 1);
    assert_eq!(lines.get_values().unwrap(), vec![1, 0, 0]);
    sim.set_pull(3, 1);
    assert_eq!(lines.get_values().unwrap(), vec![1, 0, 1]);
}

#[test]
fn set_then_get_round_trips() {
    let (sim, chip) = open(8);
    let mut lines = chip.get_lines(&[6, 2, 4]).unwrap();
    lines
        .request_output("test", &[0, 0, 0], RequestFlags::empty())
        .unwrap();
    lines.set_values(&[1, 0, 5]).unwrap();
    assert_eq!(lines.get_values().unwrap(), vec![1, 0, 1]);
    assert_eq!(sim.level(6), Some(1));
    assert_eq!(sim.level(2), Some(0));
    assert_eq!(sim.level(4), Some(1));
}

#[test]
fn defaults_are_applied_per_index() {
    let (sim, chip) = open(4);
    let mut lines = chip.get_lines(&[3, 0]).unwrap();
    lines
        .request_output("test", &[1, 0], RequestFlags::empty())
        .unwrap();
    assert_eq!(sim.level(3), Some(1));
    assert_eq!(sim.level(0), Some(0));
}

#[test]
fn wrong_default_count_claims_nothing() {
    let (sim, chip) = open(4);
    let mut lines = chip.get_lines(&[0, 1, 2]).unwrap();
    let err = lines
        .request_output("test", &[1, 1], RequestFlags::empty())
        .unwrap_err();
    match err.kind() {
        ErrorKind::RequestFailed(RequestFailure::ValueCount { lines, values }) => {
            assert_eq!((*lines, *values), (3, 2));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!lines.is_requested());
    for offset in 0..3 {
        assert!(!sim.is_requested(offset));
    }
}

#[test]
fn wrong_value_count_is_refused() {
    let (_sim, chip) = open(4);
    let mut lines = chip.get_lines(&[0, 1]).unwrap();
    lines
        .request_output("test", &[0, 0], RequestFlags::empty())
        .unwrap();
    assert!(matches!(
        lines.set_values(&[1]).unwrap_err().kind(),
        ErrorKind::RequestFailed(RequestFailure::ValueCount { .. })
    ));
}

#[test]
fn partially_busy_group_claims_nothing() {
    let (sim, chip) = open(4);
    let mut held = chip.get_line(2).unwrap();
    held.request_input("held", RequestFlags::empty()).unwrap();

    let mut lines = chip.get_lines(&[0, 1, 2]).unwrap();
    assert!(matches!(
        lines.request_input("test", RequestFlags::empty()).unwrap_err().kind(),
        ErrorKind::RequestFailed(RequestFailure::Driver(_))
    ));
    assert!(!sim.is_requested(0));
    assert!(!sim.is_requested(1));
}

#[test]
fn duplicate_offsets_keep_their_positions() {
    let (_sim, chip) = open(4);
    let lines = chip.get_lines(&[2, 2, 0]).unwrap();
    assert_eq!(lines.offsets(), &[2, 2, 0]);
    assert_eq!(lines.get_line(0).unwrap().offset().unwrap(), 2);
    assert_eq!(lines.get_line(1).unwrap().offset().unwrap(), 2);
    assert_eq!(lines.get_line(2).unwrap().offset().unwrap(), 0);
}

#[test]
fn index_out_of_range() {
    let (_sim, chip) = open(4);
    let lines = chip.get_lines(&[0, 1]).unwrap();
    match lines.get_line(2).unwrap_err().kind() {
        ErrorKind::IndexOutOfRange { index, len } => assert_eq!((*index, *len), (2, 2)),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn empty_group_cannot_be_requested() {
    let (_sim, chip) = open(4);
    let mut lines = chip.get_lines(&[]).unwrap();
    assert_eq!(lines.num_lines(), 0);
    assert!(matches!(
        lines.request_input("test", RequestFlags::empty()).unwrap_err().kind(),
        ErrorKind::RequestFailed(RequestFailure::NoLines)
    ));
}

#[test]
fn oversized_group_is_refused() {
    let (_sim, chip) = open(MAX_REQUEST_LINES as u32 + 1);
    let mut lines = chip.get_all_lines().unwrap();
    assert!(matches!(
        lines.request_input("test", RequestFlags::empty()).unwrap_err().kind(),
        ErrorKind::RequestFailed(RequestFailure::TooManyLines(_))
    ));
}

#[test]
fn released_group_rejects_io() {
    let (sim, chip) = open(4);
    let mut lines = chip.get_lines(&[0, 1]).unwrap();
    lines
        .request_output("test", &[1, 1], RequestFlags::empty())
        .unwrap();
    lines.release();
    assert!(!sim.is_requested(0));
    assert!(matches!(lines.get_values().unwrap_err().kind(), ErrorKind::ReleasedResource));
    assert!(matches!(
        lines.set_values(&[0, 0]).unwrap_err().kind(),
        ErrorKind::ReleasedResource
    ));
    lines.release();
}

#[test]
fn group_on_closed_chip() {
    let (_sim, mut chip) = open(4);
    let mut lines = chip.get_lines(&[0, 1]).unwrap();
    lines.request_input("test", RequestFlags::empty()).unwrap();
    chip.close();
    assert!(matches!(lines.get_values().unwrap_err().kind(), ErrorKind::ClosedResource));
    lines.release();
}

#[test]
fn lines_taken_from_a_group_share_its_request() {
    let (sim, chip) = open(4);
    let mut lines = chip.get_lines(&[0, 1, 2]).unwrap();
    lines
        .request_output("test", &[0, 0, 0], RequestFlags::empty())
        .unwrap();

    let mut middle = lines.get_line(1).unwrap();
    assert!(middle.is_requested());
    middle.set_value(1).unwrap();
    assert_eq!(lines.get_values().unwrap(), vec![0, 1, 0]);
    assert_eq!(middle.get_value().unwrap(), 1);

    // The request lives until every holder lets go.
    lines.release();
    assert!(sim.is_requested(1));
    assert_eq!(sim.level(1), Some(1));
    middle.release();
    assert!(!sim.is_requested(0));
    assert!(!sim.is_requested(1));
}

#[test]
fn lines_from_an_unrequested_group_are_independent() {
    let (sim, chip) = open(4);
    let lines = chip.get_lines(&[0, 1]).unwrap();
    let mut second = lines.get_line(1).unwrap();
    assert!(!second.is_requested());
    second.request_input("alone", RequestFlags::empty()).unwrap();
    assert!(sim.is_requested(1));
    assert!(!sim.is_requested(0));
}

#[test]
fn released_group_reports_release_before_counts() {
    let (_sim, chip) = open(4);
    let mut lines = chip.get_lines(&[0, 1]).unwrap();
    lines.request_input("test", RequestFlags::empty()).unwrap();
    lines.release();
    assert!(matches!(
        lines
            .request_output("test", &[1], RequestFlags::empty())
            .unwrap_err()
            .kind(),
        ErrorKind::ReleasedResource
    ));
    assert!(matches!(
        lines.set_values(&[1, 1, 1]).unwrap_err().kind(),
        ErrorKind::ReleasedResource
    ));
}

#[test]
fn closed_chip_reported_before_counts() {
    let (_sim, mut chip) = open(4);
    let mut requested = chip.get_lines(&[0, 1]).unwrap();
    requested
        .request_output("test", &[0, 0], RequestFlags::empty())
        .unwrap();
    let mut unrequested = chip.get_lines(&[2, 3]).unwrap();
    chip.close();

    assert!(matches!(
        requested.set_values(&[1]).unwrap_err().kind(),
        ErrorKind::ClosedResource
    ));
    assert!(matches!(
        unrequested
            .request_output("test", &[1, 1, 1], RequestFlags::empty())
            .unwrap_err()
            .kind(),
        ErrorKind::ClosedResource
    ));
    let mut empty = Chip::open_with(
        &SimBackend::new().with_chip(SimChip::new("gpiochip0", "sim", 2)),
        "gpiochip0",
    )
    .unwrap();
    let mut none = empty.get_lines(&[]).unwrap();
    empty.close();
    assert!(matches!(
        none.request_input("test", RequestFlags::empty()).unwrap_err().kind(),
        ErrorKind::ClosedResource
    ));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    seconds = { 5, "5s" },
    minutes = { 125, "2m" },
    hours   = { 7200, "2h" },
    days    = { 3 * 86_400, "3d" },
)]
fn elapsed_formats(secs: u64, expected: &str) {
    assert_eq!(format_elapsed(secs), expected);
}

#[test]
fn rfc3339_uses_millis_and_z() {
    let at = parse_rfc3339("2026-03-04T05:06:07+02:00").unwrap();
    assert_eq!(format_rfc3339(at), "2026-03-04T03:06:07.000Z");
}

#[test]
fn rfc3339_rejects_garbage() {
    assert!(parse_rfc3339("yesterday").is_none());
    assert!(parse_rfc3339("").is_none());
}

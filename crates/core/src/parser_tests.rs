// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::model::{Action, Status};

#[test]
fn parses_top_level_fields() {
    let line = "lrh=[type=HAL_NONE idx=517/31144] fid=[0x200000400:0x1:0x0] action=ARCHIVE status=STARTED";
    let record = parse_line(line).expect("line has a valid idx pair");
    assert_eq!(record.cat_idx, 517);
    assert_eq!(record.rec_idx, 31144);
    assert_eq!(record.fid, Some(Fid::new("0x200000400:0x1:0x0")));
    assert_eq!(record.action, Some(Action::Archive));
    assert_eq!(record.status, Some(Status::Started));
}

#[test]
fn top_level_idx_wins_over_nested_idx() {
    let line = "lrh=[idx=1/1] idx=[517/31144]";
    let record = parse_line(line).expect("top-level idx present");
    assert_eq!(record.cat_idx, 517);
    assert_eq!(record.rec_idx, 31144);
}

#[test]
fn falls_back_to_nested_idx_when_no_top_level_idx() {
    let line = "lrh=[type=HAL_NONE idx=517/31144] action=RESTORE";
    let record = parse_line(line).expect("nested idx present");
    assert_eq!(record.cat_idx, 517);
    assert_eq!(record.rec_idx, 31144);
    assert_eq!(record.action, Some(Action::Restore));
}

#[test]
fn nested_action_fid_status_are_used_when_absent_at_top_level() {
    let line = "lrh=[idx=1/2 action=REMOVE fid=0xdead status=FAILED]";
    let record = parse_line(line).expect("nested idx present");
    assert_eq!(record.cat_idx, 1);
    assert_eq!(record.rec_idx, 2);
    assert_eq!(record.action, Some(Action::Remove));
    assert_eq!(record.fid, Some(Fid::new("0xdead")));
    assert_eq!(record.status, Some(Status::Failed));
}

#[test]
fn unknown_action_and_status_tokens_round_trip_as_other() {
    let line = "idx=[1/1] action=MIGRATE status=UNKNOWN_TOKEN";
    let record = parse_line(line).expect("idx present");
    assert_eq!(record.action, Some(Action::Other("MIGRATE".to_string())));
    assert_eq!(record.status, Some(Status::Other("UNKNOWN_TOKEN".to_string())));
}

#[test]
fn missing_idx_yields_none() {
    let line = "action=ARCHIVE status=STARTED fid=0xa";
    assert_eq!(parse_line(line), None);
}

#[test]
fn malformed_idx_pair_yields_none() {
    let line = "idx=[not-a-number/also-not]";
    assert_eq!(parse_line(line), None);
}

#[test]
fn empty_line_yields_none() {
    assert_eq!(parse_line(""), None);
}

#[test]
fn garbage_line_without_key_value_tokens_yields_none() {
    assert_eq!(parse_line("the quick brown fox"), None);
}

#[test]
fn fid_and_action_without_status_are_optional() {
    let line = "idx=[9/9]";
    let record = parse_line(line).expect("idx present");
    assert_eq!(record.cat_idx, 9);
    assert_eq!(record.rec_idx, 9);
    assert_eq!(record.fid, None);
    assert_eq!(record.action, None);
    assert_eq!(record.status, None);
}

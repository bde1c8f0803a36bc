// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parses one line of an MDT action-log snapshot.
//!
//! The grammar is informal: whitespace-separated `key=value` tokens, where a
//! value may be a bare token or a bracketed token `[...]` containing further
//! `key=value` pairs one level deep (e.g. `lrh=[type=... idx=517/31144]`).
//! Top-level fields win over inner-bracket fields of the same name.

use crate::model::{Action, ActionRecord, Fid, Status};
use regex::Regex;
use std::sync::OnceLock;

fn top_level_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"(\w+)=((?:\[[^\]]*\])|(?:\S+))").expect("static pattern is valid regex")
    })
}

fn inner_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"(\w+)=([^\s\[\]]+)").expect("static pattern is valid regex")
    })
}

#[derive(Default)]
struct Fields {
    cat_idx: Option<u64>,
    rec_idx: Option<u64>,
    fid: Option<String>,
    action: Option<String>,
    status: Option<String>,
}

/// Splits a `C/R` pair (optionally still bracketed) into two non-negative
/// integers. Returns `None` on anything that doesn't parse cleanly —
/// malformed index pairs are silently dropped, never propagated as errors.
fn parse_idx(value: &str) -> Option<(u64, u64)> {
    let stripped = value.trim_start_matches('[').trim_end_matches(']');
    let (cat, rec) = stripped.split_once('/')?;
    let cat_idx = cat.parse::<u64>().ok()?;
    let rec_idx = rec.parse::<u64>().ok()?;
    Some((cat_idx, rec_idx))
}

fn strip_brackets(value: &str) -> String {
    value
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string()
}

/// Parses one log line into a normalized [`ActionRecord`], or `None` if the
/// line doesn't carry a valid `idx=[C/R]` pair. Pure, total, never panics.
pub fn parse_line(line: &str) -> Option<ActionRecord> {
    let mut fields = Fields::default();

    for caps in top_level_re().captures_iter(line) {
        let key = &caps[1];
        let value = &caps[2];

        match key {
            "idx" => {
                if let Some((cat_idx, rec_idx)) = parse_idx(value) {
                    fields.cat_idx = Some(cat_idx);
                    fields.rec_idx = Some(rec_idx);
                }
            }
            "action" => fields.action = Some(strip_brackets(value)),
            "fid" => fields.fid = Some(strip_brackets(value)),
            "status" => fields.status = Some(strip_brackets(value)),
            _ if value.starts_with('[') && value.ends_with(']') => {
                let inner = &value[1..value.len() - 1];
                for inner_caps in inner_field_re().captures_iter(inner) {
                    let ikey = &inner_caps[1];
                    let ival = &inner_caps[2];
                    match ikey {
                        "idx" if fields.cat_idx.is_none() => {
                            if let Some((cat_idx, rec_idx)) = parse_idx(ival) {
                                fields.cat_idx = Some(cat_idx);
                                fields.rec_idx = Some(rec_idx);
                            }
                        }
                        "action" if fields.action.is_none() => {
                            fields.action = Some(ival.to_string());
                        }
                        "fid" if fields.fid.is_none() => {
                            fields.fid = Some(ival.to_string());
                        }
                        "status" if fields.status.is_none() => {
                            fields.status = Some(ival.to_string());
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    let cat_idx = fields.cat_idx?;
    let rec_idx = fields.rec_idx?;

    Some(ActionRecord {
        cat_idx,
        rec_idx,
        fid: fields.fid.map(Fid::new),
        action: fields.action.as_deref().map(Action::parse),
        status: fields.status.as_deref().map(Status::parse),
    })
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;

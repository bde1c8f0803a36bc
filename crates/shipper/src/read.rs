// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reads one MDT action-log snapshot defensively: a file that vanishes or
//! changes mid-read must never be mistaken for a clean, stable scan.

use std::io::ErrorKind;
use std::path::Path;

/// Reads `path`, reporting whether the read can be trusted.
///
/// `true` means the file existed, was read in one pass, and its size and
/// mtime were unchanged before and after — safe to diff against the cache
/// and safe to purge keys that are now missing. `false` covers every other
/// case (missing file, permission error, or a file that changed under us),
/// and callers must defer purges for that MDT this cycle: the content
/// returned alongside `false` may be empty or partial and must not be taken
/// as ground truth.
pub(crate) fn read_file_safely(path: &Path) -> (Vec<u8>, bool) {
    let before = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::warn!(?path, "mdt action log missing this cycle, treating as empty");
            return (Vec::new(), false);
        }
        Err(err) => {
            tracing::warn!(?path, %err, "could not stat mdt action log");
            return (Vec::new(), false);
        }
    };

    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            tracing::warn!(?path, %err, "could not read mdt action log");
            return (Vec::new(), false);
        }
    };

    let after = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(_) => return (data, false),
    };

    let stable = before.len() == after.len()
        && before.modified().ok() == after.modified().ok();
    if !stable {
        tracing::warn!(?path, "mdt action log changed mid-read, deferring purges this cycle");
    }
    (data, stable)
}

#[cfg(test)]
#[path = "read_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use md5::{Digest, Md5};

/// MD5 digest of a raw log line, folded into a `u128` for cheap storage and
/// comparison in the scan cache. Content identity only, never exposed as a
/// security primitive.
pub(crate) fn hash_line(line: &str) -> u128 {
    let bytes: [u8; 16] = Md5::digest(line.as_bytes()).into();
    u128::from_be_bytes(bytes)
}

#[cfg(test)]
#[path = "hash_tests.rs"]
mod tests;

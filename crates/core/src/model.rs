// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The action-stream data model: identity, cache entries, and wire events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Define a newtype wrapper around `String` used for identity at call sites
/// (an MDT name and a FID are both strings, but never interchangeable).
macro_rules! define_string_id {
    ($(#[$meta:meta])* pub struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_string_id! {
    /// A metadata target name, derived from the grandparent directory of a
    /// matched log snapshot path.
    pub struct Mdt;
}

define_string_id! {
    /// A Lustre file identifier, opaque beyond being the identity half of an
    /// [`ActionKey`].
    pub struct Fid;
}

/// Define a string-backed enum whose known variants serialize to their
/// literal uppercase token, with an `Other(String)` catch-all that
/// round-trips any value the grammar doesn't yet recognize.
///
/// The source log's `enum{...}` fields (`action`, `status`) are explicitly
/// open: new values can appear before this crate knows about them, and they
/// must survive a parse/re-serialize cycle unchanged.
macro_rules! define_open_enum {
    ($name:ident { $($variant:ident => $lit:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $lit,)+
                    Self::Other(s) => s.as_str(),
                }
            }

            pub fn parse(s: &str) -> Self {
                match s {
                    $($lit => Self::$variant,)+
                    other => Self::Other(other.to_string()),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Ok(Self::parse(&s))
            }
        }
    };
}

define_open_enum!(Action {
    Archive => "ARCHIVE",
    Restore => "RESTORE",
    Remove => "REMOVE",
});

define_open_enum!(Status {
    Waiting => "WAITING",
    Started => "STARTED",
    Succeed => "SUCCEED",
    Failed => "FAILED",
    Canceled => "CANCELED",
    Purged => "PURGED",
});

/// Identity used for stream-level reconciliation: `fid:action`.
///
/// Stable across an action's full lifecycle even though the composite
/// `(mdt, cat_idx, rec_idx)` key the filesystem hands out may be recycled
/// once the action completes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionKey(String);

impl ActionKey {
    pub fn new(fid: &Fid, action: &Action) -> Self {
        Self(format!("{fid}:{action}"))
    }

    /// Placeholder identity for a purge whose cached info is missing — an
    /// orphan carried over from a prior run with no recorded `fid`/`action`.
    pub fn synthesize_unknown(cat_idx: u64, rec_idx: u64) -> Self {
        Self(format!("unknown:{cat_idx}:{rec_idx}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite key the filesystem's snapshot exposes for an in-progress
/// action. Stable only while that action exists; the tuple may be recycled
/// once the action is dropped from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub mdt: Mdt,
    pub cat_idx: u64,
    pub rec_idx: u64,
}

impl CacheKey {
    pub fn new(mdt: Mdt, cat_idx: u64, rec_idx: u64) -> Self {
        Self {
            mdt,
            cat_idx,
            rec_idx,
        }
    }

    /// Parses the `"{mdt}:{cat_idx}:{rec_idx}"` form the scan-cache file
    /// stores its keys as. Returns `None` on anything that doesn't split
    /// into exactly those three parts with two valid integers.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, ':');
        let mdt = parts.next()?;
        let cat_idx = parts.next()?.parse().ok()?;
        let rec_idx = parts.next()?.parse().ok()?;
        Some(Self::new(Mdt::new(mdt), cat_idx, rec_idx))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.mdt, self.cat_idx, self.rec_idx)
    }
}

/// Parser output for one non-empty log line. Only the fields the grammar
/// guarantees (`cat_idx`, `rec_idx`) are required; `fid`/`action`/`status`
/// may be absent on an otherwise-valid line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub cat_idx: u64,
    pub rec_idx: u64,
    pub fid: Option<Fid>,
    pub action: Option<Action>,
    pub status: Option<Status>,
}

/// What the scan cache remembers about an action as of the last
/// successfully-shipped snapshot: enough to detect a future change and to
/// synthesize a PURGED event if the action vanishes before the next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The 128-bit MD5 digest of the raw line, as a plain integer.
    pub hash: u128,
    pub action: Option<Action>,
    pub fid: Option<Fid>,
    pub action_key: ActionKey,
}

/// The three event kinds a stream can carry. Closed, unlike `Action`/
/// `Status`: the shipper and maintenance loop are the only emitters, and
/// both are under this crate's control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "NEW")]
    New,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "PURGED")]
    Purged,
}

/// The self-describing record appended to a per-MDT stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub event_type: EventType,
    pub mdt: Mdt,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cat_idx: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rec_idx: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fid: Option<Fid>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<Status>,
    pub action_key: ActionKey,
    pub timestamp: u64,
    /// The original log line. Always absent for `PURGED` (there's nothing
    /// left to quote).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub raw: Option<String>,
    /// Present only on maintenance-injected corrective events.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<String>,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;

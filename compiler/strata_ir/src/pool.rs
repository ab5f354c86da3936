//! Evaluation pools.

use std::fmt;

/// Where a value lives.
///
/// `State` values are computed once and persisted as part of the data
/// structure; `Runtime` values are recomputed on every query call from the
/// structure's current state plus the call arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Pool {
    State,
    Runtime,
}

impl Pool {
    pub const ALL: [Pool; 2] = [Pool::State, Pool::Runtime];

    #[inline]
    pub fn is_runtime(self) -> bool {
        self == Pool::Runtime
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pool::State => f.write_str("state"),
            Pool::Runtime => f.write_str("runtime"),
        }
    }
}

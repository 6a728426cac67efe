//! Local/UTC timestamp pairs.
//!
//! Entries record both the wall-clock time of the server and the UTC time of
//! every creation and modification. Both halves are persisted as
//! `YYYY-MM-DD HH:MM:SS` strings so they sort lexically.

use crate::Error;
use chrono::{DateTime, Local, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Storage format for both halves of a [`DatePair`].
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A moment in time expressed in server-local time and in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatePair {
    local: NaiveDateTime,
    gmt: NaiveDateTime,
}

impl DatePair {
    /// The current time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Builds the pair from a UTC instant, deriving the local half.
    /// Sub-second precision is dropped, matching the storage format.
    #[must_use]
    pub fn from_utc(at: DateTime<Utc>) -> Self {
        let at = at.trunc_subsecs(0);
        Self {
            local: at.with_timezone(&Local).naive_local(),
            gmt: at.naive_utc(),
        }
    }

    /// Parses the two persisted strings back into a pair.
    pub fn parse(local: &str, gmt: &str) -> Result<Self, Error> {
        let parse = |s: &str| {
            NaiveDateTime::parse_from_str(s, DATE_FORMAT)
                .map_err(|e| Error::InvalidTimestamp(format!("{s:?}: {e}")))
        };
        Ok(Self {
            local: parse(local)?,
            gmt: parse(gmt)?,
        })
    }

    /// Server-local half.
    #[must_use]
    pub const fn local(&self) -> NaiveDateTime {
        self.local
    }

    /// UTC half.
    #[must_use]
    pub const fn gmt(&self) -> NaiveDateTime {
        self.gmt
    }

    /// The UTC instant.
    #[must_use]
    pub fn to_utc(&self) -> DateTime<Utc> {
        self.gmt.and_utc()
    }

    /// Local half in storage format.
    #[must_use]
    pub fn local_string(&self) -> String {
        self.local.format(DATE_FORMAT).to_string()
    }

    /// UTC half in storage format.
    #[must_use]
    pub fn gmt_string(&self) -> String {
        self.gmt.format(DATE_FORMAT).to_string()
    }
}

impl Default for DatePair {
    fn default() -> Self {
        Self::now()
    }
}

//! Identifier types used throughout the Quire core.
//!
//! All identifiers are database-assigned row ids. A value is only ever
//! constructed from a row that exists (or is about to be inserted), so the
//! types are thin wrappers that keep the different id spaces apart.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw row id.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Wraps a raw row id, rejecting zero and negative values.
            pub fn try_new(id: i64) -> Result<Self, Error> {
                if id > 0 {
                    Ok(Self(id))
                } else {
                    Err(Error::InvalidIdentifier(format!("{} {}", $label, id)))
                }
            }

            /// Returns the underlying row id.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let id = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| Error::InvalidIdentifier(format!("{} {:?}", $label, s)))?;
                Self::try_new(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> i64 {
                id.0
            }
        }
    };
}

row_id!(
    /// Identifier of a section (content type).
    SectionId,
    "section"
);

row_id!(
    /// Identifier of a field definition. Also names the field's data table.
    FieldId,
    "field"
);

row_id!(
    /// Identifier of an entry, assigned when its shell row is first inserted.
    EntryId,
    "entry"
);

row_id!(
    /// Identifier of an author.
    AuthorId,
    "author"
);

impl FieldId {
    /// Name of the physical table holding this field's entry data.
    #[must_use]
    pub fn data_table(self) -> String {
        format!("tbl_entries_data_{}", self.0)
    }
}

//! Row identifiers for hive entities.
//!
//! The relational store hands out integer keys, so every id is a thin
//! newtype over `i64` that cannot be mixed up with another entity's id.

use serde::{Deserialize, Serialize};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Raw integer value as stored in the database.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

row_id!(
    /// Identifier of a dispatched worker process.
    WorkerId
);

row_id!(
    /// Identifier of an analysis (pipeline stage).
    AnalysisId
);

row_id!(
    /// Identifier of a resource class.
    ResourceClassId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_id_display_and_parse() {
        let id = WorkerId(1234);
        assert_eq!(id.to_string(), "1234");
        assert_eq!("1234".parse::<WorkerId>().unwrap(), id);
        assert!("12a".parse::<WorkerId>().is_err());
    }

    #[test]
    fn test_ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&AnalysisId(7)).unwrap();
        assert_eq!(json, "7");
    }
}

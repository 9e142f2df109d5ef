//! Utilities. OBVIOUSLY.

use crate::error::Result;
use chrono::{DateTime, Utc};
use rasn::{
    types::{constraints::Constraints, Identifier, Tag},
    AsnType, Decode, Decoder, Encode, Encoder,
};
use serde_derive::{Deserialize, Serialize};
use std::ops::Deref;
use std::str::FromStr;

pub mod ser;
#[cfg(test)]
pub(crate) mod test;

/// Creates a content-addressed id type: a newtype over [`Hash`][crate::crypto::base::Hash]
/// with conversions to/from its base64 string form.
macro_rules! object_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, rasn::AsnType, rasn::Encode, rasn::Decode, serde_derive::Serialize, serde_derive::Deserialize)]
        #[rasn(delegate)]
        pub struct $name(crate::crypto::base::Hash);

        impl $name {
            /// Grab this id's string form.
            pub fn as_string(&self) -> String {
                self.0.as_string()
            }

            #[cfg(test)]
            #[allow(dead_code)]
            pub(crate) fn random() -> Self {
                Self(crate::crypto::base::Hash::random_blake3())
            }
        }

        impl std::ops::Deref for $name {
            type Target = crate::crypto::base::Hash;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<crate::crypto::base::Hash> for $name {
            fn from(hash: crate::crypto::base::Hash) -> Self {
                Self(hash)
            }
        }

        impl std::convert::TryFrom<&$name> for String {
            type Error = crate::error::Error;
            fn try_from(id: &$name) -> std::result::Result<String, Self::Error> {
                String::try_from(&id.0)
            }
        }

        impl std::convert::TryFrom<&str> for $name {
            type Error = crate::error::Error;
            fn try_from(id_str: &str) -> std::result::Result<Self, Self::Error> {
                Ok(Self(crate::crypto::base::Hash::try_from(id_str)?))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_string())
            }
        }
    }
}

/// Allows an object to expose a public (private-data-stripped) version of
/// itself, and to say whether it holds private data at all.
pub trait Public {
    /// Return a version of this object with all private data removed.
    fn strip_private(&self) -> Self;

    /// Whether this object has private data contained within.
    fn has_private(&self) -> bool;
}

/// A library-local representation of a time. Wraps chrono so the encoding of
/// times (millisecond integers on the wire, RFC 3339 in human formats) lives
/// in exactly one place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a new Timestamp from the current date/time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Build a timestamp from unix milliseconds.
    pub fn from_unix_millis(millis: i64) -> Result<Self> {
        let datetime = DateTime::<Utc>::from_timestamp_millis(millis).ok_or(crate::error::Error::BadLength)?;
        Ok(Self(datetime))
    }
}

impl Deref for Timestamp {
    type Target = DateTime<Utc>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(date: DateTime<Utc>) -> Self {
        Self(date)
    }
}

impl FromStr for Timestamp {
    type Err = chrono::format::ParseError;
    fn from_str(s: &str) -> std::result::Result<Timestamp, Self::Err> {
        let datetime: DateTime<Utc> = s.parse()?;
        Ok(Timestamp(datetime))
    }
}

impl AsnType for Timestamp {
    const TAG: Tag = Tag::INTEGER;
}

impl Encode for Timestamp {
    fn encode_with_tag_and_constraints<'encoder, E: Encoder<'encoder>>(
        &self,
        encoder: &mut E,
        tag: Tag,
        constraints: Constraints,
        identifier: Identifier,
    ) -> std::result::Result<(), E::Error> {
        self.0.timestamp_millis().encode_with_tag_and_constraints(encoder, tag, constraints, identifier)
    }
}

impl Decode for Timestamp {
    fn decode_with_tag_and_constraints<D: Decoder>(
        decoder: &mut D,
        tag: Tag,
        constraints: Constraints,
    ) -> std::result::Result<Self, D::Error> {
        let millis = i64::decode_with_tag_and_constraints(decoder, tag, constraints)?;
        let datetime = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| rasn::de::Error::no_valid_choice("timestamp out of range", rasn::Codec::Der))?;
        Ok(Self(datetime))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::ser;

    #[test]
    fn timestamp_der_roundtrip() {
        let ts = Timestamp::from_str("2021-04-01T00:01:44Z").unwrap();
        let bytes = ser::serialize(&ts).unwrap();
        let ts2: Timestamp = ser::deserialize(&bytes).unwrap();
        assert_eq!(ts, ts2);
    }

    #[test]
    fn timestamp_millis() {
        let ts = Timestamp::from_unix_millis(1617235304000).unwrap();
        assert_eq!(ts.timestamp_millis(), 1617235304000);
    }
}

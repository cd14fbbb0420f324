//! # Cursor Module
//!
//! Opaque page cursors.
//!
//! A cursor is the postcard encoding of a storage key, wrapped in unpadded
//! URL-safe base64 so it can travel in a query string untouched. Callers treat
//! it as a token; only the storage layer knows the key type behind it.

use crate::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque position in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Encode a storage key as a cursor.
    pub fn encode<K: Serialize>(key: &K) -> Result<Self> {
        let bytes = postcard::to_allocvec(key)?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Decode the storage key behind this cursor.
    ///
    /// Any malformed token yields [`Error::InvalidCursor`].
    pub fn decode<K: DeserializeOwned>(&self) -> Result<K> {
        let bytes = URL_SAFE_NO_PAD
            .decode(self.0.as_bytes())
            .map_err(|_| Error::InvalidCursor)?;
        postcard::from_bytes(&bytes).map_err(|_| Error::InvalidCursor)
    }

    /// The token as it appears in URLs.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Cursor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty()
            || !s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(Error::InvalidCursor);
        }
        Ok(Self(s.to_string()))
    }
}

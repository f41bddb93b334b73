use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::Display;
use std::hash::Hasher;

/// A short key addressing a stored URL.
///
/// Keys produced by [`ShortKey::derive`] are the padded URL-safe base64
/// encoding of the big-endian FNV-1a 64-bit digest of the original URL,
/// so the same long URL always yields the same key. Two distinct URLs may
/// collide; backends treat a colliding save as an already-existing key,
/// never as an error.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ShortKey(SmolStr);

impl ShortKey {
    /// Derives the key for a long URL.
    ///
    /// Deterministic and infallible: repeated calls with the same input
    /// yield the same 12-character key.
    pub fn derive(original_url: &str) -> Self {
        let mut hasher = FnvHasher::default();
        hasher.write(original_url.as_bytes());
        Self(SmolStr::new(URL_SAFE.encode(hasher.finish().to_be_bytes())))
    }

    /// Wraps a key that already exists, without re-deriving it.
    ///
    /// Use this for keys read back from storage or supplied by callers
    /// that hold one (e.g. a redirect request).
    pub fn new(key: impl Into<SmolStr>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }
}

impl std::fmt::Debug for ShortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ShortKey").field(&self.0).finish()
    }
}

impl Display for ShortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ShortKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ShortKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = SmolStr::deserialize(deserializer)?;
        Ok(Self(s))
    }
}

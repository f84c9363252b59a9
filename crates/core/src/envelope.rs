//! Stored document envelope
//!
//! The envelope is the only value the backend holds for a key: the current
//! value (or its absence), the current version, a bounded window of recent
//! patches and the time of the last write.
//!
//! ## Tombstones
//!
//! Removing a document keeps its envelope with `value = None`. The version
//! keeps advancing and the patch window keeps the removal, so pollers see
//! it. Envelopes are never physically deleted here.
//!
//! ## Encoding
//!
//! Envelopes are stored as JSON text. A tombstone omits the `value` member;
//! a present JSON `null` is written as `"value": null`, so the two survive a
//! round trip distinctly.

use crate::contract::Version;
use crate::error::Result;
use crate::json::JsonValue;
use crate::patch::{Patch, PatchOp};
use serde::{Deserialize, Deserializer, Serialize};

/// Default number of patches retained per key
pub const DEFAULT_MAX_PATCHES: usize = 20;

/// Full stored record for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Version of the last committed mutation
    pub version: Version,
    /// Current value, `None` for a tombstone
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub value: Option<JsonValue>,
    /// Recent patches, oldest first, strictly increasing in version
    pub patches: Vec<Patch>,
    /// Time of the last committed mutation, nanoseconds since epoch
    pub updated_at_ns: u64,
}

// A member that is present always holds a value, `null` included.
fn deserialize_present<'de, D>(deserializer: D) -> std::result::Result<Option<JsonValue>, D::Error>
where
    D: Deserializer<'de>,
{
    JsonValue::deserialize(deserializer).map(Some)
}

impl Envelope {
    /// True if the document is currently deleted
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Version the next mutation of a key must carry
    ///
    /// A key with no envelope starts a fresh `(now_ns, 1)`. Any existing
    /// envelope, tombstone included, advances its revision so that
    /// `created_at_ns` stays constant for the key's lifetime.
    pub fn next_version(prev: Option<&Envelope>, now_ns: u64) -> Version {
        match prev {
            Some(env) => env.version.next(),
            None => Version::initial(now_ns),
        }
    }

    /// Build the envelope that follows `prev` after a committed change
    ///
    /// Keeps at most `max_patches` patches (new one included), evicting the
    /// oldest first. Returns the new envelope and the patch it appended.
    pub fn successor(
        prev: Option<Envelope>,
        value: Option<JsonValue>,
        ops: Vec<PatchOp>,
        operation_id: Option<String>,
        now_ns: u64,
        max_patches: usize,
    ) -> (Envelope, Patch) {
        let version = Envelope::next_version(prev.as_ref(), now_ns);
        let patch = Patch {
            version,
            operation_id,
            ops,
        };

        let mut patches = prev.map(|env| env.patches).unwrap_or_default();
        let keep = max_patches.max(1) - 1;
        if patches.len() > keep {
            patches.drain(..patches.len() - keep);
        }
        patches.push(patch.clone());

        let envelope = Envelope {
            version,
            value,
            patches,
            updated_at_ns: now_ns,
        };
        (envelope, patch)
    }

    /// Buffered patches strictly newer than `known`
    pub fn patches_since(&self, known: &Version) -> Vec<Patch> {
        self.patches
            .iter()
            .filter(|p| p.version.is_newer_than(known))
            .cloned()
            .collect()
    }

    /// Serialize for the backend
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from backend bytes
    pub fn decode(bytes: &[u8]) -> Result<Envelope> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

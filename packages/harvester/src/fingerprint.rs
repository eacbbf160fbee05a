//! Content fingerprints for change detection.
//!
//! A fingerprint is a digest over the *meaningful* projection of a payload,
//! not over its raw bytes. Each category decides what is meaningful:
//!
//! - listing: item count, sorted item names, sorted detail links
//! - diagram: element count, per-element content length in document order,
//!   sorted element sources
//! - detail: project name, company name, sorted attribute keys and values
//!
//! Timestamps, page chrome and raw diagram bytes never enter the digest, so
//! an insignificant re-render does not look like a change.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::types::payload::{DetailPayload, DiagramPayload, ListingPayload, Payload};

/// Digest length in bytes.
pub const FINGERPRINT_LEN: usize = 16;

/// Fixed-size digest of a payload's meaningful fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// First eight hex chars, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

impl FromStr for Fingerprint {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; FINGERPRINT_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Fingerprint a payload using its category's projection.
pub fn fingerprint(payload: &Payload) -> Fingerprint {
    let mut digest = CanonicalDigest::new();
    match payload {
        Payload::Diagram(diagram) => project_diagram(&mut digest, diagram),
        Payload::Listing(listing) => project_listing(&mut digest, listing),
        Payload::Detail(detail) => project_detail(&mut digest, detail),
    }
    digest.finish()
}

fn project_diagram(digest: &mut CanonicalDigest, diagram: &DiagramPayload) {
    digest.tag("diagram");
    digest.count(diagram.elements.len());
    // Element order is the drawing order, so lengths stay in sequence.
    for element in &diagram.elements {
        digest.count(element.content.len());
    }
    let sources = sorted(diagram.elements.iter().filter_map(|e| e.source_url.as_deref()));
    digest.strings(&sources);
}

fn project_listing(digest: &mut CanonicalDigest, listing: &ListingPayload) {
    digest.tag("listing");
    digest.count(listing.items.len());
    let names = sorted(listing.items.iter().map(|item| item.name.as_str()));
    let links = sorted(listing.items.iter().filter_map(|item| item.detail_url.as_deref()));
    digest.strings(&names);
    digest.strings(&links);
}

fn project_detail(digest: &mut CanonicalDigest, detail: &DetailPayload) {
    digest.tag("detail");
    digest.string(&detail.project_name);
    digest.string(detail.company_name.as_deref().unwrap_or_default());
    // BTreeMap keys iterate sorted already.
    let keys: Vec<&str> = detail.attributes.keys().map(String::as_str).collect();
    let values = sorted(detail.attributes.values().map(String::as_str));
    digest.strings(&keys);
    digest.strings(&values);
}

fn sorted<'a>(items: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut items: Vec<&str> = items.collect();
    items.sort_unstable();
    items
}

/// Length-prefixed feed into SHA-256, so field boundaries are unambiguous.
struct CanonicalDigest(Sha256);

impl CanonicalDigest {
    fn new() -> Self {
        Self(Sha256::new())
    }

    fn tag(&mut self, tag: &str) {
        self.string(tag);
    }

    fn count(&mut self, n: usize) {
        self.0.update((n as u64).to_le_bytes());
    }

    fn string(&mut self, s: &str) {
        self.count(s.len());
        self.0.update(s.as_bytes());
    }

    fn strings(&mut self, items: &[&str]) {
        self.count(items.len());
        for item in items {
            self.string(item);
        }
    }

    fn finish(self) -> Fingerprint {
        let full = self.0.finalize();
        let mut bytes = [0u8; FINGERPRINT_LEN];
        bytes.copy_from_slice(&full[..FINGERPRINT_LEN]);
        Fingerprint(bytes)
    }
}

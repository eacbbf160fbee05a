//! Address canonicalization.
//!
//! Equivalent addresses (query parameters in a different order, a trailing
//! slash, a fragment) collapse to one [`CanonicalKey`] so the ledger sees one
//! logical resource.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::{form_urlencoded, Position, Url};

/// Placeholder origin used to canonicalize relative addresses.
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// Normalized identifier of one logical resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalize a raw address.
///
/// Drops the fragment, sorts query pairs by key then value, strips one
/// trailing `/` from non-root paths. Relative addresses come back relative.
/// Unparseable input is returned unmodified.
pub fn canonicalize(raw: &str) -> CanonicalKey {
    match Url::parse(raw) {
        Ok(url) => CanonicalKey(normalize(url).into()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let joined = Url::parse(RELATIVE_BASE).and_then(|base| base.join(raw));
            match joined {
                Ok(url) => CanonicalKey(normalize(url)[Position::BeforePath..].to_string()),
                Err(e) => unparsed(raw, e),
            }
        }
        Err(e) => unparsed(raw, e),
    }
}

fn unparsed(raw: &str, error: url::ParseError) -> CanonicalKey {
    tracing::debug!(address = %raw, error = %error, "address not parseable, keeping it verbatim");
    CanonicalKey(raw.to_string())
}

fn normalize(mut url: Url) -> Url {
    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&pairs)
            .finish();
        url.set_query(Some(&query));
    }

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path[..path.len() - 1].to_string();
        url.set_path(&trimmed);
    }

    url
}

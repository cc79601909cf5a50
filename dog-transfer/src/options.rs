use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{TransferError, TransferResult};

/// Options accepted by uploads
pub const ALLOWED_UPLOAD_OPTIONS: &[&str] = &[
    "ACL",
    "CacheControl",
    "ContentDisposition",
    "ContentEncoding",
    "ContentLanguage",
    "ContentType",
    "Expires",
    "GrantFullControl",
    "GrantRead",
    "GrantReadACP",
    "GrantWriteACL",
    "Metadata",
    "RequestPayer",
    "ServerSideEncryption",
    "StorageClass",
    "SSECustomerAlgorithm",
    "SSECustomerKey",
    "SSECustomerKeyMD5",
    "SSEKMSKeyId",
    "WebsiteRedirectLocation",
];

/// Options accepted by downloads
pub const ALLOWED_DOWNLOAD_OPTIONS: &[&str] = &[
    "VersionId",
    "SSECustomerAlgorithm",
    "SSECustomerKey",
    "SSECustomerKeyMD5",
    "RequestPayer",
];

/// Subset of the upload options every part request must repeat
pub const UPLOAD_PART_OPTIONS: &[&str] = &[
    "SSECustomerAlgorithm",
    "SSECustomerKey",
    "SSECustomerKeyMD5",
    "RequestPayer",
];

/// Transfer direction, used to pick an allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Upload,
    Download,
}

impl Direction {
    pub fn allowed(&self) -> &'static [&'static str] {
        match self {
            Direction::Upload => ALLOWED_UPLOAD_OPTIONS,
            Direction::Download => ALLOWED_DOWNLOAD_OPTIONS,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => write!(f, "upload"),
            Direction::Download => write!(f, "download"),
        }
    }
}

/// Caller-supplied request options (ACL, content metadata, SSE parameters).
///
/// Keys are checked against a per-direction allow-list before any request is
/// made; values are passed through to the [`ObjectStore`](crate::ObjectStore)
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOptions(BTreeMap<String, String>);

impl TransferOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Reject the first key not allowed for `direction`
    pub fn validate(&self, direction: Direction) -> TransferResult<()> {
        let allowed = direction.allowed();
        match self.0.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(TransferError::invalid_option(key.clone(), direction)),
            None => Ok(()),
        }
    }

    /// Copy of these options restricted to `keys`
    pub fn filtered(&self, keys: &[&str]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TransferOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

use serde::{Deserialize, Serialize};

/// A service advertised by a running container.
/// This is the wire model returned by the registry listing. Field names are
/// part of the HTTP contract and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Advertised service name, e.g. "web"
    #[serde(rename = "Name")]
    pub name: String,

    /// Advertised address, e.g. "10.0.0.1:80". Unique within a listing.
    #[serde(rename = "Addr")]
    pub address: String,
}

impl Service {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

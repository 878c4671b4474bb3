//! Agent addresses
//!
//! TigerStyle: Explicit validation on construction, immutable afterwards.

use crate::constants::ADDRESS_LENGTH_BYTES_MAX;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of a message sender or receiver
///
/// Addresses are opaque to the kernel: the surrounding framework chooses
/// them, the kernel only compares, orders and hashes them (per-sender
/// mailboxes key their buffers by address).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(Arc<str>);

impl Address {
    /// Create a new address with validation
    ///
    /// # Errors
    /// Returns error if the address is empty, too long, or contains
    /// characters outside `[A-Za-z0-9-_.:/@]`.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();

        if address.is_empty() {
            return Err(Error::InvalidAddress {
                address,
                reason: "address must not be empty".into(),
            });
        }

        if address.len() > ADDRESS_LENGTH_BYTES_MAX {
            return Err(Error::AddressTooLong {
                length: address.len(),
                limit: ADDRESS_LENGTH_BYTES_MAX,
            });
        }

        let valid = address
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '/' | '@'));
        if !valid {
            return Err(Error::InvalidAddress {
                address,
                reason: "address contains invalid characters".into(),
            });
        }

        Ok(Self(Arc::from(address)))
    }

    /// Get the address as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Address {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0.to_string()
    }
}

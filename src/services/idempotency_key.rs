//! Derives the dedup key for a completion signal.
//!
//! An externally issued handle (checkout session id) is always preferred.
//! Without one the key is synthesized from the current instant plus a short
//! content fingerprint. That fallback is a degraded mode: two identical
//! reports in the same millisecond share a key, and reports straddling a
//! millisecond boundary do not. The fuzzy rule in the duplicate detector
//! covers the latter.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::domain::{Buyer, Product};
use crate::ports::price_key;

pub const FALLBACK_KEY_PREFIX: &str = "manual_";

const FINGERPRINT_HEX_LEN: usize = 16;

/// Where a resolved key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    External,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub key: String,
    pub source: KeySource,
}

pub fn resolve(
    external: Option<&str>,
    buyer: &Buyer,
    product: &Product,
    now: DateTime<Utc>,
) -> ResolvedKey {
    if let Some(handle) = external.map(str::trim).filter(|h| !h.is_empty()) {
        return ResolvedKey {
            key: handle.to_string(),
            source: KeySource::External,
        };
    }

    let key = format!(
        "{}{}_{}",
        FALLBACK_KEY_PREFIX,
        now.timestamp_millis(),
        fingerprint(buyer, product)
    );
    tracing::warn!(
        transaction_key = %key,
        buyer_email = %buyer.email,
        "completion signal without transaction handle, using fallback key"
    );

    ResolvedKey {
        key,
        source: KeySource::Fallback,
    }
}

fn fingerprint(buyer: &Buyer, product: &Product) -> String {
    let mut hasher = Sha256::new();
    hasher.update(buyer.email.as_bytes());
    hasher.update(b"|");
    hasher.update(product.name.as_bytes());
    hasher.update(b"|");
    hasher.update(price_key(&product.price).as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(FINGERPRINT_HEX_LEN);
    digest
}

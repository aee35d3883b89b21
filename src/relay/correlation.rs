//! # Correlation id issuance.
//!
//! [`CorrelationIssuer`] mints the ids the relay attaches to delivered
//! events. It holds no mutable state and needs no lock; any number of
//! producer threads may call [`CorrelationIssuer::new_id`] at once.
//!
//! - [`IdScheme::Wide`]: UUIDv7 in simple (32 hex chars) form: a 48-bit
//!   millisecond timestamp followed by 74 random bits.
//! - [`IdScheme::Compact`]: `"<unix-seconds>:<4 base62 chars>"`. About
//!   1.5×10^7 codes per second, so collisions are plausible under load; the
//!   relay re-draws when a freshly minted id is still outstanding.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use uuid::Uuid;

use crate::events::CorrelationId;

const BASE62: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const COMPACT_CODE_LEN: usize = 4;

/// Format of minted correlation ids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdScheme {
    /// Time-ordered 128-bit id (UUIDv7, simple hex form).
    #[default]
    Wide,
    /// Short `"<seconds>:<code>"` id.
    Compact,
}

/// Stateless correlation id generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct CorrelationIssuer {
    scheme: IdScheme,
}

impl CorrelationIssuer {
    /// Creates an issuer for the given scheme.
    pub fn new(scheme: IdScheme) -> Self {
        Self { scheme }
    }

    /// Returns the configured scheme.
    pub fn scheme(&self) -> IdScheme {
        self.scheme
    }

    /// Mints a new id.
    pub fn new_id(&self) -> CorrelationId {
        match self.scheme {
            IdScheme::Wide => Uuid::now_v7().simple().to_string().into(),
            IdScheme::Compact => compact_id().into(),
        }
    }
}

fn compact_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut rng = rand::rng();
    let code: String = (0..COMPACT_CODE_LEN)
        .map(|_| char::from(BASE62[rng.random_range(0..BASE62.len())]))
        .collect();

    format!("{secs}:{code}")
}

//! Opaque cursor tokens: versioned JSON, base64url without padding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::base64_url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CursorError {
    #[error("invalid base64url in cursor")]
    InvalidBase64,
    #[error("malformed cursor json")]
    InvalidJson,
    #[error("unsupported cursor version")]
    InvalidVersion,
    #[error("cursor sort tokens are malformed")]
    InvalidOrder,
    #[error("cursor was issued for a different query")]
    FingerprintMismatch,
}

/// Position of the next page plus the query it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorV1 {
    /// Row offset of the page the cursor points at.
    pub position: u64,
    /// Signed sort tokens, e.g. `"-created,+id"`.
    pub order: String,
    /// Short hash of filters and ordering.
    pub fingerprint: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct Wire {
    v: u8,
    p: u64,
    s: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    f: Option<String>,
}

impl CursorV1 {
    const VERSION: u8 = 1;

    pub fn encode(&self) -> String {
        let wire = Wire {
            v: Self::VERSION,
            p: self.position,
            s: self.order.clone(),
            f: self.fingerprint.clone(),
        };
        // Serializing a struct of plain fields cannot fail.
        let json = serde_json::to_vec(&wire).unwrap_or_default();
        base64_url::encode(&json)
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = base64_url::decode(token).map_err(|_| CursorError::InvalidBase64)?;
        let wire: Wire = serde_json::from_slice(&bytes).map_err(|_| CursorError::InvalidJson)?;
        if wire.v != Self::VERSION {
            return Err(CursorError::InvalidVersion);
        }
        let well_formed = wire.s.is_empty()
            || wire.s.split(',').all(|t| {
                (t.starts_with('+') || t.starts_with('-')) && t.len() > 1
            });
        if !well_formed {
            return Err(CursorError::InvalidOrder);
        }
        Ok(Self {
            position: wire.p,
            order: wire.s,
            fingerprint: wire.f,
        })
    }

    /// Rejects a cursor issued for a different filter/ordering combination.
    pub fn verify(&self, order: &str, fingerprint: Option<&str>) -> Result<(), CursorError> {
        if self.order != order || self.fingerprint.as_deref() != fingerprint {
            return Err(CursorError::FingerprintMismatch);
        }
        Ok(())
    }
}

//! HMAC-SHA256 request signing.
//!
//! The signed payload is the literal byte sequence `"POST <url>\n"`
//! followed by the request body; no query normalization, no headers. The
//! prefix depends only on the configured URL, so it is computed once per
//! signer.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signs request bodies for a fixed delivery URL.
#[derive(Clone)]
pub struct RequestSigner {
    header: String,
    secret: Vec<u8>,
    prefix: Vec<u8>,
}

impl RequestSigner {
    /// Creates a signer that covers `POST <url>` requests and carries the
    /// signature in `header`.
    pub fn new(header: impl Into<String>, secret: impl Into<Vec<u8>>, url: &str) -> Self {
        Self {
            header: header.into(),
            secret: secret.into(),
            prefix: format!("POST {url}\n").into_bytes(),
        }
    }

    /// Header name carrying the signature.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Lowercase hex HMAC-SHA256 over the signing prefix and `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(&self.prefix);
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The secret never appears in logs.
        f.debug_struct("RequestSigner").field("header", &self.header).finish_non_exhaustive()
    }
}

//! Request signing for the HTTP surface.
//!
//! A server key pair is created on first start ([`KeyBootstrap`]); only the public half is kept.
//! Clients sign `METHOD:path?query:timestamp` with RSA-PSS and send the result in the
//! `x-signature` header. [`SignatureVerifier`] rejects missing headers, timestamps more than
//! [`REPLAY_WINDOW_SECS`] away from server time, and signatures that do not verify.

mod error;
mod keys;
mod verify;

pub use error::{AuthError, Result};
pub use keys::{
    announce_private_key, escape_pem, generate_key_pair, looks_like_public_key, parse_public_key,
    unescape_pem, BootstrappedKey, EnvFileStore, KeyBootstrap, KeyMaterial, KeySource,
    DEFAULT_KEY_BITS, PUBLIC_KEY_VAR,
};
pub use verify::{
    canonical_payload, SignatureAlgorithm, SignatureVerifier, SignedRequest, ALGORITHM_HEADER,
    REPLAY_WINDOW_SECS, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};

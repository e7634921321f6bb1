use crate::error::{AuthError, Result};
use crate::keys::parse_public_key;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use rsa::pss::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::digest::FixedOutputReset;
use sha2::{Digest, Sha256, Sha384, Sha512};

pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const SIGNATURE_HEADER: &str = "x-signature";
pub const ALGORITHM_HEADER: &str = "x-signature-algorithm";

/// Maximum accepted distance between the signed timestamp and server time, in either direction.
pub const REPLAY_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl SignatureAlgorithm {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sha-256" | "sha256" | "rsa-sha256" => Some(Self::Sha256),
            "sha-384" | "sha384" | "rsa-sha384" => Some(Self::Sha384),
            "sha-512" | "sha512" | "rsa-sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }
}

/// The authenticated envelope of one HTTP request, as read from its headers.
#[derive(Debug, Clone, Default)]
pub struct SignedRequest {
    pub method: String,
    /// Path plus query string, exactly as sent.
    pub path: String,
    pub timestamp: Option<String>,
    pub signature: Option<String>,
    pub algorithm: Option<String>,
}

impl SignedRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Fill the auth fields through a case-insensitive header lookup.
    pub fn with_headers<'h>(mut self, header: impl Fn(&str) -> Option<&'h str>) -> Self {
        self.timestamp = header(TIMESTAMP_HEADER).map(str::to_string);
        self.signature = header(SIGNATURE_HEADER).map(str::to_string);
        self.algorithm = header(ALGORITHM_HEADER).map(str::to_string);
        self
    }
}

/// `METHOD:path?query:timestamp`. The body is never part of the signed payload.
pub fn canonical_payload(method: &str, path: &str, timestamp: &str) -> String {
    format!("{}:{path}:{timestamp}", method.to_ascii_uppercase())
}

/// Holds the server public key and checks signed requests against it.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    public_key: RsaPublicKey,
    window: Duration,
}

impl SignatureVerifier {
    pub fn new(public_key: RsaPublicKey) -> Self {
        Self {
            public_key,
            window: Duration::seconds(REPLAY_WINDOW_SECS),
        }
    }

    /// Accepts either a PEM with real newlines or the single-line escaped form.
    pub fn from_pem(pem: &str) -> Result<Self> {
        Ok(Self::new(parse_public_key(pem)?))
    }

    pub fn verify(&self, request: &SignedRequest) -> Result<()> {
        self.verify_at(request, Utc::now())
    }

    pub fn verify_at(&self, request: &SignedRequest, now: DateTime<Utc>) -> Result<()> {
        let (Some(timestamp), Some(signature)) = (
            request.timestamp.as_deref().filter(|v| !v.trim().is_empty()),
            request.signature.as_deref().filter(|v| !v.trim().is_empty()),
        ) else {
            return Err(AuthError::MissingHeaders);
        };

        let signed_at = DateTime::parse_from_rfc3339(timestamp.trim())
            .map_err(|_| AuthError::Expired)?
            .with_timezone(&Utc);
        let skew = now.signed_duration_since(signed_at);
        if skew > self.window || skew < -self.window {
            return Err(AuthError::Expired);
        }

        let algorithm = match request.algorithm.as_deref().filter(|v| !v.trim().is_empty()) {
            None => SignatureAlgorithm::default(),
            Some(raw) => SignatureAlgorithm::parse(raw).ok_or(AuthError::InvalidSignature)?,
        };
        let signature = base64::engine::general_purpose::STANDARD
            .decode(signature.trim())
            .map_err(|_| AuthError::InvalidSignature)?;
        let payload = canonical_payload(&request.method, &request.path, timestamp);

        let valid = match algorithm {
            SignatureAlgorithm::Sha256 => {
                verify_pss::<Sha256>(&self.public_key, payload.as_bytes(), &signature)
            }
            SignatureAlgorithm::Sha384 => {
                verify_pss::<Sha384>(&self.public_key, payload.as_bytes(), &signature)
            }
            SignatureAlgorithm::Sha512 => {
                verify_pss::<Sha512>(&self.public_key, payload.as_bytes(), &signature)
            }
        };
        if valid {
            Ok(())
        } else {
            Err(AuthError::InvalidSignature)
        }
    }
}

/// PSS verification with the salt length fixed to the digest size.
fn verify_pss<D>(key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> bool
where
    D: Digest + FixedOutputReset,
{
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    let verifying_key =
        VerifyingKey::<D>::new_with_salt_len(key.clone(), <D as Digest>::output_size());
    verifying_key.verify(message, &signature).is_ok()
}

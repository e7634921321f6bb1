use crate::error::{AuthError, Result};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const PUBLIC_KEY_VAR: &str = "SERVER_PUBLIC_KEY";
pub const DEFAULT_KEY_BITS: usize = 2048;

const STORED_KEY_MARKER: &str = "SERVER_PUBLIC_KEY=\"-----BEGIN PUBLIC KEY-----";
const PEM_MARKER: &str = "-----BEGIN PUBLIC KEY-----";
const STORE_HEADER: &str = "# --- AUTO GENERATED SECURITY KEYS ---";

/// Freshly generated key pair, both halves PEM encoded.
pub struct KeyMaterial {
    pub public_pem: String,
    pub private_pem: String,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_pem", &self.public_pem)
            .field("private_pem", &"<redacted>")
            .finish()
    }
}

/// RSA key pair: SPKI public key, PKCS#8 private key.
pub fn generate_key_pair(bits: usize) -> Result<KeyMaterial> {
    let private_key = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|err| AuthError::KeyGeneration(err.to_string()))?;
    let public_key = RsaPublicKey::from(&private_key);

    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|err| AuthError::KeyGeneration(err.to_string()))?;
    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|err| AuthError::KeyGeneration(err.to_string()))?
        .to_string();

    Ok(KeyMaterial {
        public_pem,
        private_pem,
    })
}

/// Newlines become the two characters `\n` so the PEM fits on one env-file line.
pub fn escape_pem(pem: &str) -> String {
    pem.trim_end().replace("\r\n", "\n").replace('\n', "\\n")
}

pub fn unescape_pem(stored: &str) -> String {
    stored.replace("\\n", "\n")
}

pub fn parse_public_key(pem: &str) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(unescape_pem(pem).trim())
        .map_err(|_| AuthError::MissingPublicKey)
}

pub fn looks_like_public_key(value: &str) -> bool {
    value.trim_start().starts_with(PEM_MARKER)
}

/// Env-style configuration file holding the persisted public key.
#[derive(Debug, Clone)]
pub struct EnvFileStore {
    path: PathBuf,
}

impl EnvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the file already carries a public key in the stored format.
    pub fn has_public_key(&self) -> Result<bool> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.contains(STORED_KEY_MARKER)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// The stored PEM with real newlines, if present.
    pub fn load_public_key(&self) -> Result<Option<String>> {
        if !self.has_public_key()? {
            return Ok(None);
        }
        let entries = dotenvy::from_path_iter(&self.path).map_err(dotenv_error)?;
        for entry in entries {
            let (key, value) = entry.map_err(dotenv_error)?;
            if key == PUBLIC_KEY_VAR {
                return Ok(Some(unescape_pem(&value)));
            }
        }
        Ok(None)
    }

    pub fn persist_public_key(&self, public_pem: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        write!(
            file,
            "\n{STORE_HEADER}\n{PUBLIC_KEY_VAR}=\"{}\"\n",
            escape_pem(public_pem)
        )?;
        Ok(())
    }
}

fn dotenv_error(err: dotenvy::Error) -> AuthError {
    match err {
        dotenvy::Error::Io(io) => AuthError::Store(io),
        other => AuthError::Store(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            other.to_string(),
        )),
    }
}

/// Where the active public key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Store,
    Environment,
    Generated,
}

#[derive(Debug, Clone)]
pub struct BootstrappedKey {
    pub public_pem: String,
    pub source: KeySource,
}

/// First-run key setup.
///
/// An existing key in the store wins, then a key supplied through the environment. Otherwise a
/// new pair is generated, only the public half is persisted, and the private half is written to
/// `console` once.
pub struct KeyBootstrap<'a> {
    store: &'a EnvFileStore,
    configured: Option<&'a str>,
    bits: usize,
}

impl<'a> KeyBootstrap<'a> {
    pub fn new(store: &'a EnvFileStore) -> Self {
        Self {
            store,
            configured: None,
            bits: DEFAULT_KEY_BITS,
        }
    }

    pub fn with_configured(mut self, configured: Option<&'a str>) -> Self {
        self.configured = configured;
        self
    }

    pub fn with_key_bits(mut self, bits: usize) -> Self {
        self.bits = bits;
        self
    }

    pub fn run(self, console: &mut impl Write) -> Result<BootstrappedKey> {
        if let Some(public_pem) = self.store.load_public_key()? {
            parse_public_key(&public_pem)?;
            return Ok(BootstrappedKey {
                public_pem,
                source: KeySource::Store,
            });
        }

        if let Some(configured) = self.configured.filter(|v| looks_like_public_key(&unescape_pem(v)))
        {
            let public_pem = unescape_pem(configured);
            parse_public_key(&public_pem)?;
            return Ok(BootstrappedKey {
                public_pem,
                source: KeySource::Environment,
            });
        }

        log::warn!(
            "No server public key found; generating a new key pair ({} bits)",
            self.bits
        );
        let material = generate_key_pair(self.bits)?;
        self.store.persist_public_key(&material.public_pem)?;
        announce_private_key(console, &material.private_pem)?;

        Ok(BootstrappedKey {
            public_pem: material.public_pem,
            source: KeySource::Generated,
        })
    }
}

pub fn announce_private_key(console: &mut impl Write, private_pem: &str) -> Result<()> {
    let rule = "=".repeat(64);
    writeln!(console, "{rule}")?;
    writeln!(console, "NEW SERVER KEY PAIR GENERATED")?;
    writeln!(console, "{rule}")?;
    writeln!(
        console,
        "Private key for signing requests. It is NOT stored anywhere and will never be shown again:"
    )?;
    writeln!(console)?;
    writeln!(console, "{}", private_pem.trim_end())?;
    writeln!(console)?;
    writeln!(
        console,
        "The public key was saved as {PUBLIC_KEY_VAR}. Delete it to generate a new pair."
    )?;
    writeln!(console, "{rule}")?;
    console.flush()?;
    Ok(())
}

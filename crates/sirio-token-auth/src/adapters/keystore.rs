//! # Keystore
//!
//! Ed25519 keypair signing bearer tokens, persisted as PKCS#8 / SPKI PEM.
//!
//! `load_or_generate` reuses the keypair found in the directory, or creates
//! one on first start and writes it there.

use crate::domain::errors::AuthError;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::{SigningKey, VerifyingKey};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Private key file name.
pub const PRIVATE_KEY_FILE: &str = "sirio-private.pem";

/// Public key file name.
pub const PUBLIC_KEY_FILE: &str = "sirio-public.pem";

/// Bearer token signing keys.
pub struct Keystore {
    signing: SigningKey,
}

impl Keystore {
    /// Fresh in-memory keypair.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Load the keypair from `dir`, generating and saving one if absent.
    ///
    /// # Errors
    ///
    /// Unreadable or malformed PEM files, a public key that does not match
    /// the private key, or a directory that cannot be written.
    pub fn load_or_generate(dir: &Path) -> Result<Self, AuthError> {
        let private_path = dir.join(PRIVATE_KEY_FILE);
        let public_path = dir.join(PUBLIC_KEY_FILE);

        if !private_path.exists() {
            let keystore = Self::generate();
            keystore.save(dir)?;
            info!(dir = %dir.display(), "Generated bearer token keypair");
            return Ok(keystore);
        }

        let pem = fs::read_to_string(&private_path).map_err(|e| io_error(&private_path, e))?;
        let signing = SigningKey::from_pkcs8_pem(&pem)
            .map_err(|e| AuthError::Keystore(format!("{}: {e}", private_path.display())))?;
        let keystore = Self { signing };

        if public_path.exists() {
            let pem = fs::read_to_string(&public_path).map_err(|e| io_error(&public_path, e))?;
            let public = VerifyingKey::from_public_key_pem(&pem)
                .map_err(|e| AuthError::Keystore(format!("{}: {e}", public_path.display())))?;
            if public != keystore.verifying_key() {
                return Err(AuthError::Keystore(format!(
                    "{} does not match {}",
                    public_path.display(),
                    private_path.display()
                )));
            }
        } else {
            warn!(path = %public_path.display(), "Public key missing, rewriting it");
            keystore.write_public(&public_path)?;
        }

        info!(dir = %dir.display(), "Loaded bearer token keypair");
        Ok(keystore)
    }

    /// Write both PEM files into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<(), AuthError> {
        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

        let private_path = dir.join(PRIVATE_KEY_FILE);
        let pem = self
            .signing
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AuthError::Keystore(e.to_string()))?;
        let mut file = create_private(&private_path)?;
        file.write_all(pem.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| io_error(&private_path, e))?;

        self.write_public(&dir.join(PUBLIC_KEY_FILE))
    }

    fn write_public(&self, path: &Path) -> Result<(), AuthError> {
        let pem = self
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AuthError::Keystore(e.to_string()))?;
        fs::write(path, pem).map_err(|e| io_error(path, e))
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }
}

impl std::fmt::Debug for Keystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keystore")
            .field("public", &hex::encode(self.verifying_key().as_bytes()))
            .finish_non_exhaustive()
    }
}

fn io_error(path: &Path, e: std::io::Error) -> AuthError {
    AuthError::Keystore(format!("{}: {e}", path.display()))
}

/// Open the private key file for writing, owner-only before any byte lands.
#[cfg(unix)]
fn create_private(path: &Path) -> Result<File, AuthError> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| io_error(path, e))?;
    // `mode` only applies on creation; tighten a pre-existing file too.
    file.set_permissions(fs::Permissions::from_mode(0o600))
        .map_err(|e| io_error(path, e))?;
    Ok(file)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> Result<File, AuthError> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| io_error(path, e))
}

//! # Magic Logon
//!
//! Alternate password for allow-listed internal users:
//! `hex(SHA1(user + "_" + secret + "_" + app_uuid))`, lowercase.

use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

/// Compute the magic password for `user`.
pub fn magic_password(user: &str, secret: &str, app_uuid: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(user.as_bytes());
    hasher.update(b"_");
    hasher.update(secret.as_bytes());
    hasher.update(b"_");
    hasher.update(app_uuid.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check `password` against the magic password in constant time.
///
/// Hex case is ignored. An empty secret never matches.
pub fn verify_magic_password(user: &str, password: &str, secret: &str, app_uuid: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let expected = magic_password(user, secret, app_uuid);
    let given = password.to_ascii_lowercase();
    expected.as_bytes().ct_eq(given.as_bytes()).into()
}

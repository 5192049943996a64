use std::fmt;

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand_core::OsRng;
use serde::Serialize;

/// The password side of the configured administrator identity.
#[derive(Clone)]
pub enum PasswordSecret {
    Plain(String),
    /// Argon2 PHC string, e.g. produced by [`hash_password`].
    Argon2(String),
}

impl fmt::Debug for PasswordSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordSecret::Plain(_) => f.write_str("Plain(<redacted>)"),
            PasswordSecret::Argon2(_) => f.write_str("Argon2(<redacted>)"),
        }
    }
}

/// The single administrator allowed into the admin surface.
#[derive(Clone, Debug)]
pub struct AdminCredentials {
    username: String,
    password: PasswordSecret,
}

/// Who performed an admin action; carried by session tokens and audit entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AdminIdentity {
    pub username: String,
}

impl AdminIdentity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

impl fmt::Display for AdminIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Authorized(AdminIdentity),
    Unauthorized,
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password: PasswordSecret) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Exact match against the configured pair. Never errors for bad input.
    pub fn verify(&self, username: &str, password: &str) -> Verification {
        let username_matches = constant_time_eq(username.as_bytes(), self.username.as_bytes());
        let password_matches = match &self.password {
            PasswordSecret::Plain(expected) => {
                constant_time_eq(password.as_bytes(), expected.as_bytes())
            }
            PasswordSecret::Argon2(hash) => verify_password(password, hash),
        };

        if username_matches && password_matches {
            Verification::Authorized(AdminIdentity::new(self.username.clone()))
        } else {
            Verification::Unauthorized
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right.iter())
        .fold(0_u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_credentials_require_exact_match() {
        let creds = AdminCredentials::new("admin", PasswordSecret::Plain("s3cret!".into()));

        assert_eq!(
            creds.verify("admin", "s3cret!"),
            Verification::Authorized(AdminIdentity::new("admin"))
        );
        assert_eq!(creds.verify("admin", "s3cret"), Verification::Unauthorized);
        assert_eq!(creds.verify("Admin", "s3cret!"), Verification::Unauthorized);
        assert_eq!(creds.verify(" admin", "s3cret!"), Verification::Unauthorized);
    }

    #[test]
    fn hashed_credentials_verify_through_argon2() {
        let hash = hash_password("correct horse").expect("hash");
        let creds = AdminCredentials::new("admin", PasswordSecret::Argon2(hash));

        assert!(matches!(
            creds.verify("admin", "correct horse"),
            Verification::Authorized(_)
        ));
        assert_eq!(
            creds.verify("admin", "battery staple"),
            Verification::Unauthorized
        );
    }

    #[test]
    fn malformed_hash_never_authorizes() {
        let creds = AdminCredentials::new("admin", PasswordSecret::Argon2("not-a-phc".into()));
        assert_eq!(creds.verify("admin", "not-a-phc"), Verification::Unauthorized);
    }

    #[test]
    fn debug_output_hides_password() {
        let creds = AdminCredentials::new("admin", PasswordSecret::Plain("s3cret!".into()));
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("s3cret!"));
    }
}

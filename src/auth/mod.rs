mod credentials;
mod token;

pub use credentials::{
    AdminCredentials, AdminIdentity, PasswordSecret, Verification, hash_password, verify_password,
};
pub use token::{IssuedToken, SESSION_TTL_HOURS, TokenError, TokenSettings};

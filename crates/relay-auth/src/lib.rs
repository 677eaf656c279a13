//! # relay-auth
//!
//! Connection admission for the relay.
//!
//! - [`otp::CredentialStore`]: single-use, time-limited credentials with a
//!   cancellable background sweep
//! - [`login::Authenticator`]: the login policy that gates credential issuance

#![deny(unsafe_code)]

pub mod login;
pub mod otp;

pub use login::{Authenticator, LoginRequest, StaticCredentials};
pub use otp::{CredentialStore, Otp};

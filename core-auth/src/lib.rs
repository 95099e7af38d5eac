//! # Authentication Module
//!
//! Bearer-token lifecycle for the client core.
//!
//! ## Overview
//!
//! - [`TokenStore`] keeps the token and admin flag in the persisted settings
//!   store and mirrors them to the native shell when one is present.
//! - [`Credentials`] extracts the token from the response shapes the login
//!   and setup endpoints are known to return.

pub mod credentials;
pub mod error;
pub mod token_store;

pub use credentials::Credentials;
pub use error::{AuthError, Result};
pub use token_store::{TokenMirror, TokenStore, ADMIN_KEY, SIGNED_OUT_KEY, TOKEN_KEY};

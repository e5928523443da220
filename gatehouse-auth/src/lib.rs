//! # gatehouse-auth
//!
//! Sign-in authorization and the avatar update endpoint.
//!
//! [`Resolver::resolve`] answers "may this identity sign in" with a timeout
//! on the record store and a bounded fallback lookup; it always answers,
//! never errors. [`update_avatar`] lets an authenticated member change their
//! own avatar URL and nothing else.

mod error;

pub mod avatar;
pub mod resolver;
pub mod verify;

pub use avatar::{update_avatar, AvatarUpdate};
pub use error::EndpointError;
pub use resolver::{Resolution, Resolver, DEFAULT_PRIMARY_TIMEOUT};
pub use verify::{IdentityVerifier, StaticTokenVerifier};

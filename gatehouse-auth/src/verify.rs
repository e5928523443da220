//! Identity verification seam.
//!
//! The daemon receives bare bearer tokens over its socket; a verifier turns
//! them into a [`VerifiedIdentity`] or rejects them. [`StaticTokenVerifier`]
//! is the operational-testing implementation backed by the `tokens` map in
//! `config.yaml`; a real identity-provider integration plugs in behind the
//! same trait.

use std::collections::BTreeMap;

use gatehouse_core::{Config, TokenIdentity, VerifiedIdentity};

pub trait IdentityVerifier: Send + Sync {
    /// Resolve a bearer token to a verified identity, or reject it.
    fn verify(&self, bearer: &str) -> Option<VerifiedIdentity>;
}

/// Verifier backed by a static token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: BTreeMap<String, TokenIdentity>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: BTreeMap<String, TokenIdentity>) -> Self {
        Self { tokens }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tokens.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl IdentityVerifier for StaticTokenVerifier {
    fn verify(&self, bearer: &str) -> Option<VerifiedIdentity> {
        let bearer = bearer.trim();
        if bearer.is_empty() {
            return None;
        }
        self.tokens
            .get(bearer)
            .map(|identity| identity.clone().into_identity(bearer))
    }
}

//! The identity module defines the data types and operations that make up a
//! nym: the identity source, the credential trust hierarchy, the authorities
//! that orchestrate it, and the claim data derived from it.

pub mod authority;
pub mod claim;
pub mod credential;
pub mod nym;
pub mod source;

use crate::{
    crypto::base::KeyAlgo,
    identity::{
        claim::{ClaimData, ClaimKind},
        credential::{key::KeyDerivation, verification::VerificationSet},
    },
};

/// How credential keys are produced: derived from a wallet seed (HD) or
/// generated at random (legacy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialType {
    /// Keys derive deterministically from a seed.
    Hd,
    /// Keys are random.
    Legacy,
}

/// Which kind of identity source to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// Self-signed public key.
    PubKey,
    /// Payment code.
    Bip47,
}

/// The construction parameters recognized when creating a nym or an
/// authority. `Default` gives a random-keyed (but HD-typed), secp256k1,
/// public-key-sourced nym.
#[derive(Debug, Clone, getset::Getters, getset::MutGetters)]
#[getset(get = "pub", get_mut = "pub(crate)")]
pub struct NymParams {
    /// The first-choice key algorithm. Generation falls back across
    /// algorithms when this one is unsupported.
    algorithm: KeyAlgo,
    /// HD or legacy key generation.
    credential_type: CredentialType,
    /// Which kind of identity source to build.
    source_type: SourceType,
    /// The wallet seed for HD derivation and payment-code sources.
    seed: Option<Vec<u8>>,
    /// A printable fingerprint identifying the seed.
    seed_fingerprint: Option<String>,
    /// The derivation index to use when `auto_index` is off.
    seed_index: u32,
    /// The payment code format version (payment-code sources only).
    payment_code_version: u32,
    /// Whether credential slots pick their own derivation index.
    auto_index: bool,
    /// Claim data to seed the authority's first contact credential with.
    contact_data: Option<ClaimData>,
    /// Attestations to seed the authority's first verification credential
    /// with.
    verification_set: Option<VerificationSet>,
    /// A display name to seed a scope claim with.
    display_name: Option<String>,
    /// What kind of entity the nym is (defaults to an individual).
    scope: ClaimKind,
}

impl Default for NymParams {
    fn default() -> Self {
        Self {
            algorithm: KeyAlgo::Secp256k1,
            credential_type: CredentialType::Hd,
            source_type: SourceType::PubKey,
            seed: None,
            seed_fingerprint: None,
            seed_index: 0,
            payment_code_version: 1,
            auto_index: true,
            contact_data: None,
            verification_set: None,
            display_name: None,
            scope: ClaimKind::Individual,
        }
    }
}

impl NymParams {
    /// Pick the key algorithm.
    pub fn with_algorithm(mut self, algorithm: KeyAlgo) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Pick HD or legacy key generation.
    pub fn with_credential_type(mut self, credential_type: CredentialType) -> Self {
        self.credential_type = credential_type;
        self
    }

    /// Pick the source kind.
    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    /// Supply a wallet seed (and its fingerprint) for HD derivation.
    pub fn with_seed(mut self, seed: Vec<u8>, fingerprint: String) -> Self {
        self.seed = Some(seed);
        self.seed_fingerprint = Some(fingerprint);
        self
    }

    /// Pin the derivation index instead of using the next free slot.
    pub fn with_seed_index(mut self, index: u32) -> Self {
        self.seed_index = index;
        self.auto_index = false;
        self
    }

    /// Pick the payment code version.
    pub fn with_payment_code_version(mut self, version: u32) -> Self {
        self.payment_code_version = version;
        self
    }

    /// Seed the authority with claim data.
    pub fn with_contact_data(mut self, contact_data: ClaimData) -> Self {
        self.contact_data = Some(contact_data);
        self
    }

    /// Seed the authority with attestations.
    pub fn with_verification_set(mut self, verification_set: VerificationSet) -> Self {
        self.verification_set = Some(verification_set);
        self
    }

    /// Seed the nym with a display name (a scope claim).
    pub fn with_display_name(mut self, name: String) -> Self {
        self.display_name = Some(name);
        self
    }

    /// Declare what kind of entity the nym is.
    pub fn with_scope(mut self, scope: ClaimKind) -> Self {
        self.scope = scope;
        self
    }

    /// The HD derivation for a credential slot, if this is an HD setup with a
    /// seed. With `auto_index` the slot picks its own index; otherwise the
    /// pinned `seed_index` wins.
    pub(crate) fn derivation_for(&self, slot_index: u32) -> Option<KeyDerivation> {
        match (self.credential_type, self.seed.as_ref()) {
            (CredentialType::Hd, Some(seed)) => {
                let index = if self.auto_index { slot_index } else { self.seed_index };
                Some(KeyDerivation::new(
                    seed.clone(),
                    self.seed_fingerprint.clone().unwrap_or_default(),
                    index,
                ))
            }
            _ => None,
        }
    }
}

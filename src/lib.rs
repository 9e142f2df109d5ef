//! Welcome to the nym core, a digital-identity and credential-trust engine.
//!
//! A nym is a self-sovereign identity: its identifier derives from a
//! cryptographic source (a self-signed public key, or an externally provable
//! payment code), and everything it asserts about itself is carried by a
//! hierarchy of signed credentials rooted at a master credential.
//!
//! The pieces, bottom-up:
//!
//! 1. The [crypto](crate::crypto) layer wraps hashing, symmetric sealing,
//!    multi-algorithm signing/encryption keypairs, and the ECDH session
//!    negotiation used to address encrypted payloads to "an identity" rather
//!    than to one specific key.
//! 1. An [identity source](crate::identity::source) defines how a nym's
//!    identifier is derived and how its master credential proves legitimacy.
//! 1. [Credentials](crate::identity::credential) form the trust hierarchy:
//!    a self-signed master, slot-indexed secondary key credentials, and
//!    contact/verification credentials carrying claim data and attestations,
//!    all master-signed.
//! 1. An [authority](crate::identity::authority) owns exactly one master and
//!    orchestrates every child-credential lifecycle operation, including
//!    revocation bookkeeping and full/ids-only serialization against a
//!    pluggable [credential store](crate::store).
//! 1. The [claim data model](crate::identity::claim) is a persistent value
//!    structure (section → group → item) with deterministic merge semantics,
//!    derived from contact credentials and cached on the nym.
//! 1. The [nym](crate::identity::nym) aggregates it all and is the single
//!    entry point external collaborators use.
//!
//! Verification never throws: anything checking a signature or proof answers
//! with a boolean, because trying keys that don't match is a routine part of
//! the protocols here. Construction and deserialization, on the other hand,
//! fail loudly and completely; no partially built identity object ever
//! escapes.

pub mod error;
#[macro_use]
pub mod util;
pub mod crypto;
pub mod identity;
pub mod store;

pub use crate::{
    crypto::base::KeyAlgo,
    error::{Error, Result},
    identity::{
        authority::Authority,
        claim::{Claim, ClaimData},
        nym::Nym,
        source::NymSource,
        CredentialType, NymParams, SourceType,
    },
};

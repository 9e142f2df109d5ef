//! Credentials are the signed building blocks of an authority's trust
//! hierarchy. Every credential shares a common core (version, role, mode,
//! master linkage, signatures) and layers its own payload on top: key
//! material, claim data, or verification attestations.
//!
//! A credential's id is a digest of its canonical public unsigned form, so
//! the id is stable whether or not the private halves or signatures are
//! present. Signing and verification always run over that same form.

use crate::{
    crypto::base::{SignKeypairPublic, SignKeypairSignature},
    error::Result,
    util::{
        ser::{self, SerdeBinary},
        Public,
    },
};
use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use serde_derive::{Deserialize, Serialize};

pub mod contact;
pub mod key;
pub mod primary;
pub mod secondary;
pub mod verification;

use contact::ContactCredential;
use primary::PrimaryCredential;
use secondary::SecondaryCredential;
use verification::VerificationCredential;

object_id! {
    /// A unique identifier for a credential: a digest of its canonical public
    /// unsigned serialized form.
    CredentialID
}

/// The role a credential plays within its authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(enumerated)]
pub enum CredentialRole {
    /// The root key credential of an authority.
    MasterKey,
    /// A child key credential.
    ChildKey,
    /// A credential carrying claim data.
    Contact,
    /// A credential carrying verification attestations.
    Verify,
}

/// Whether a credential carries private key halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(enumerated)]
pub enum CredentialMode {
    /// Public halves only.
    Public,
    /// Private halves present (sealed).
    Private,
}

/// The role a signature plays on a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(enumerated)]
pub enum SignatureRole {
    /// A signature over the credential's public unsigned form, made with the
    /// credential's own signing key (or the master's, for credentials that
    /// hold no keys).
    PublicSelf,
    /// A signature over the credential's private unsigned form.
    PrivateSelf,
    /// The authority master's signature over a child credential.
    Master,
    /// An identity source's external signature over a master credential.
    Source,
}

/// A signature attached to a credential, tagged with its role and the id of
/// the credential whose key produced it.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct CredentialSignature {
    /// What this signature is vouching for.
    #[rasn(tag(explicit(0)))]
    role: SignatureRole,
    /// The id of the credential that owns the signing key. For self
    /// signatures this is the signed credential's own id.
    #[rasn(tag(explicit(1)))]
    credential_id: CredentialID,
    /// The signature itself.
    #[rasn(tag(explicit(2)))]
    signature: SignKeypairSignature,
}

impl CredentialSignature {
    /// Create a new credential signature.
    pub fn new(role: SignatureRole, credential_id: CredentialID, signature: SignKeypairSignature) -> Self {
        Self {
            role,
            credential_id,
            signature,
        }
    }
}

/// The fields every credential kind shares.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct CredentialCommon {
    /// The credential format version.
    #[rasn(tag(explicit(0)))]
    version: u32,
    /// The role this credential plays in its authority.
    #[rasn(tag(explicit(1)))]
    role: CredentialRole,
    /// Whether private key halves ride along.
    #[rasn(tag(explicit(2)))]
    mode: CredentialMode,
    /// The id of the authority's master credential. Empty only on the master
    /// itself.
    #[rasn(tag(explicit(3)))]
    master_id: Option<CredentialID>,
    /// The signatures attached to this credential.
    #[rasn(tag(explicit(4)))]
    signatures: Vec<CredentialSignature>,
}

impl CredentialCommon {
    /// Create a new common block with no signatures yet.
    pub(crate) fn new(version: u32, role: CredentialRole, mode: CredentialMode, master_id: Option<CredentialID>) -> Self {
        Self {
            version,
            role,
            mode,
            master_id,
            signatures: Vec::new(),
        }
    }

    /// Find the first signature with the given role.
    pub fn signature_for(&self, role: SignatureRole) -> Option<&CredentialSignature> {
        self.signatures.iter().find(|sig| sig.role() == &role)
    }

    /// Attach a signature.
    pub(crate) fn push_signature(&mut self, signature: CredentialSignature) {
        self.signatures.push(signature);
    }

    /// Remove all signatures (used to produce the unsigned preimage form).
    pub(crate) fn clear_signatures(&mut self) {
        self.signatures.clear();
    }

    /// A decoded credential with a zero version is repaired by upgrading it to
    /// the minimum version its container requires.
    pub(crate) fn repair_version(&mut self, minimum: u32) {
        if self.version == 0 {
            self.version = minimum;
        }
    }

    /// Verify this credential's master signature: it must exist, declare the
    /// expected master id, and verify under the master's signing key over the
    /// given preimage.
    pub(crate) fn verify_master_signature(&self, master_id: &CredentialID, master_key: &SignKeypairPublic, preimage: &[u8]) -> bool {
        if self.master_id.as_ref() != Some(master_id) {
            return false;
        }
        let sig = match self.signature_for(SignatureRole::Master) {
            Some(sig) => sig,
            None => return false,
        };
        if sig.credential_id() != master_id {
            return false;
        }
        master_key.verify(sig.signature(), preimage).is_ok()
    }

    /// Verify a self signature of the given role with the given key over the
    /// given preimage, checking that the signature declares the expected id.
    pub(crate) fn verify_self_signature(
        &self,
        role: SignatureRole,
        id: &CredentialID,
        key: &SignKeypairPublic,
        preimage: &[u8],
    ) -> bool {
        let sig = match self.signature_for(role) {
            Some(sig) => sig,
            None => return false,
        };
        if sig.credential_id() != id {
            return false;
        }
        key.verify(sig.signature(), preimage).is_ok()
    }
}

/// Any credential. The variant is the credential's type; shared behavior
/// dispatches through here.
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(choice)]
pub enum Credential {
    #[rasn(tag(explicit(0)))]
    Primary(PrimaryCredential),
    #[rasn(tag(explicit(1)))]
    Secondary(SecondaryCredential),
    #[rasn(tag(explicit(2)))]
    Contact(ContactCredential),
    #[rasn(tag(explicit(3)))]
    Verification(VerificationCredential),
}

impl Credential {
    /// This credential's content-derived id.
    pub fn id(&self) -> Result<CredentialID> {
        match self {
            Self::Primary(cred) => cred.id(),
            Self::Secondary(cred) => cred.id(),
            Self::Contact(cred) => cred.id(),
            Self::Verification(cred) => cred.id(),
        }
    }

    /// The shared fields of this credential.
    pub fn common(&self) -> &CredentialCommon {
        match self {
            Self::Primary(cred) => cred.common(),
            Self::Secondary(cred) => cred.common(),
            Self::Contact(cred) => cred.common(),
            Self::Verification(cred) => cred.common(),
        }
    }

    /// Repair a zero version up to the given minimum (decoders run this so a
    /// malformed version never propagates).
    pub(crate) fn repair_version(&mut self, minimum: u32) {
        match self {
            Self::Primary(cred) => cred.common_mut().repair_version(minimum),
            Self::Secondary(cred) => cred.common_mut().repair_version(minimum),
            Self::Contact(cred) => cred.common_mut().repair_version(minimum),
            Self::Verification(cred) => cred.common_mut().repair_version(minimum),
        }
    }
}

impl Public for Credential {
    fn strip_private(&self) -> Self {
        match self {
            Self::Primary(cred) => Self::Primary(cred.strip_private()),
            Self::Secondary(cred) => Self::Secondary(cred.strip_private()),
            Self::Contact(cred) => Self::Contact(cred.clone()),
            Self::Verification(cred) => Self::Verification(cred.clone()),
        }
    }

    fn has_private(&self) -> bool {
        match self {
            Self::Primary(cred) => cred.has_private(),
            Self::Secondary(cred) => cred.has_private(),
            Self::Contact(..) => false,
            Self::Verification(..) => false,
        }
    }
}

impl SerdeBinary for Credential {}

/// Compute a credential id from the credential's public unsigned DER form.
pub(crate) fn id_for_preimage(preimage: &[u8]) -> Result<CredentialID> {
    Ok(CredentialID::from(crate::crypto::base::Hash::new_blake3(preimage)?))
}

/// Serialize a credential-shaped object in one of its canonical forms:
/// private or public, signed or unsigned. The public unsigned form is the
/// id/signature preimage.
pub(crate) fn serialize_form<T>(cred: &T, as_private: bool, as_signed: bool) -> Result<Vec<u8>>
where
    T: Clone + Public + Encode + CredentialMut,
{
    let mut copy = if as_private { cred.clone() } else { cred.strip_private() };
    if !as_signed {
        copy.common_mut().clear_signatures();
    }
    ser::serialize(&copy)
}

/// Internal access to a credential's common block, for the serialization
/// helpers above.
pub(crate) trait CredentialMut {
    fn common_mut(&mut self) -> &mut CredentialCommon;
}

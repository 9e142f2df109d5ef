//! Verification credentials wrap a set of per-claim attestations. Each
//! attestation is independently signed and independently checked: validating
//! the credential asks the parent authority's key material about each item,
//! rather than trusting the set as a whole.

use crate::{
    crypto::base::{SecretKey, SignKeypairPublic},
    error::Result,
    identity::{
        claim::ClaimID,
        credential::{
            id_for_preimage, primary::PrimaryCredential, serialize_form, CredentialCommon, CredentialID, CredentialMode, CredentialMut,
            CredentialRole, CredentialSignature, SignatureRole,
        },
    },
    util::{ser::{self, SerdeBinary}, Public},
};
use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use serde_derive::{Deserialize, Serialize};

/// The id preimage of a single attestation.
#[derive(AsnType, Encode, Decode)]
struct VerificationItemPreimage {
    #[rasn(tag(explicit(0)))]
    claim_id: ClaimID,
    #[rasn(tag(explicit(1)))]
    approved: bool,
}

/// One attestation: a claim id, an approve/refute flag, and a signature by
/// the attesting credential.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct VerificationItem {
    /// The claim being attested.
    #[rasn(tag(explicit(0)))]
    claim_id: ClaimID,
    /// Whether the attester confirms the claim.
    #[rasn(tag(explicit(1)))]
    approved: bool,
    /// The attestation signature.
    #[rasn(tag(explicit(2)))]
    signature: CredentialSignature,
}

impl VerificationItem {
    /// Create an attestation signed with the given master's signing key.
    pub fn new(seal_key: &SecretKey, master: &PrimaryCredential, claim_id: ClaimID, approved: bool) -> Result<Self> {
        let preimage = ser::serialize(&VerificationItemPreimage {
            claim_id: claim_id.clone(),
            approved,
        })?;
        let sig = master.keyset().sign().key().sign(seal_key, &preimage)?;
        Ok(Self {
            claim_id,
            approved,
            signature: CredentialSignature::new(SignatureRole::Master, master.id()?, sig),
        })
    }

    /// Check this attestation against the given signing key. The caller (the
    /// parent authority) decides which key to offer.
    pub fn validate(&self, key: &SignKeypairPublic) -> bool {
        let preimage = match ser::serialize(&VerificationItemPreimage {
            claim_id: self.claim_id.clone(),
            approved: self.approved,
        }) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        key.verify(self.signature.signature(), &preimage).is_ok()
    }
}

/// A versioned set of attestations.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct VerificationSet {
    /// The set format version.
    #[rasn(tag(explicit(0)))]
    version: u32,
    /// The attestations.
    #[rasn(tag(explicit(1)))]
    items: Vec<VerificationItem>,
}

impl VerificationSet {
    /// Create a new attestation set.
    pub fn new(version: u32, items: Vec<VerificationItem>) -> Self {
        Self { version, items }
    }
}

impl SerdeBinary for VerificationSet {}

/// A credential carrying a verification set, bound to the authority by the
/// master's signatures (like contact credentials, these hold no keys).
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct VerificationCredential {
    /// The fields every credential shares.
    #[rasn(tag(explicit(0)))]
    common: CredentialCommon,
    /// The attestation payload.
    #[rasn(tag(explicit(1)))]
    verification_set: VerificationSet,
}

impl VerificationCredential {
    /// Create a new verification credential signed by the given master.
    pub fn generate(seal_key: &SecretKey, master: &PrimaryCredential, version: u32, verification_set: VerificationSet) -> Result<Self> {
        let master_id = master.id()?;
        let mut cred = Self {
            common: CredentialCommon::new(version, CredentialRole::Verify, CredentialMode::Public, Some(master_id.clone())),
            verification_set,
        };
        let id = cred.id()?;
        let preimage = cred.serialize_public_unsigned()?;
        let self_sig = master.keyset().sign().key().sign(seal_key, &preimage)?;
        cred.common
            .push_signature(CredentialSignature::new(SignatureRole::PublicSelf, id, self_sig));
        let master_sig = master.keyset().sign().key().sign(seal_key, &preimage)?;
        cred.common
            .push_signature(CredentialSignature::new(SignatureRole::Master, master_id, master_sig));
        Ok(cred)
    }

    /// This credential's content-derived id.
    pub fn id(&self) -> Result<CredentialID> {
        id_for_preimage(&self.serialize_public_unsigned()?)
    }

    /// The id/signature preimage: the (always public) unsigned form.
    pub fn serialize_public_unsigned(&self) -> Result<Vec<u8>> {
        serialize_form(self, false, false)
    }

    /// Run this credential's validation state machine against its declared
    /// master: the envelope signatures, then every attestation independently.
    pub fn validate(&self, master_id: &CredentialID, master_key: &SignKeypairPublic) -> bool {
        if self.common.version() == &0 {
            return false;
        }
        if self.common.role() != &CredentialRole::Verify || self.common.mode() != &CredentialMode::Public {
            return false;
        }
        let id = match self.id() {
            Ok(id) => id,
            Err(_) => return false,
        };
        let preimage = match self.serialize_public_unsigned() {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        if !self.common.verify_self_signature(SignatureRole::PublicSelf, &id, master_key, &preimage) {
            return false;
        }
        if !self.common.verify_master_signature(master_id, master_key, &preimage) {
            return false;
        }
        // each attestation stands or falls on its own; report the stragglers
        // but check them all
        let mut all_ok = true;
        for item in self.verification_set.items() {
            if !item.validate(master_key) {
                tracing::warn!(claim_id = %item.claim_id(), "verification item failed validation");
                all_ok = false;
            }
        }
        all_ok
    }
}

impl CredentialMut for VerificationCredential {
    fn common_mut(&mut self) -> &mut CredentialCommon {
        &mut self.common
    }
}

impl Public for VerificationCredential {
    fn strip_private(&self) -> Self {
        self.clone()
    }

    fn has_private(&self) -> bool {
        false
    }
}

impl SerdeBinary for VerificationCredential {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::identity::credential::primary::{tests::make_master, SourceProofType};

    #[test]
    fn verification_credential_lifecycle() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let master = make_master(&mut rng, &seal_key, SourceProofType::SelfSignature);
        let master_id = master.id().unwrap();
        let master_pub = SignKeypairPublic::from(master.keyset().sign().key().clone());

        let items = vec![
            VerificationItem::new(&seal_key, &master, ClaimID::random(), true).unwrap(),
            VerificationItem::new(&seal_key, &master, ClaimID::random(), false).unwrap(),
        ];
        let set = VerificationSet::new(1, items);
        let cred = VerificationCredential::generate(&seal_key, &master, 1, set).unwrap();
        assert!(cred.validate(&master_id, &master_pub));

        // flipping one attestation's verdict invalidates that item (and the
        // envelope, since the payload changed)
        let mut tampered = cred.clone();
        tampered.verification_set_mut().items_mut()[0].set_approved(false);
        assert!(!tampered.validate(&master_id, &master_pub));
    }

    #[test]
    fn verification_item_foreign_key_fails() {
        let mut rng = crate::util::test::rng();
        let mut rng2 = crate::util::test::rng_seeded(5);
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let master = make_master(&mut rng, &seal_key, SourceProofType::SelfSignature);
        let foreign = make_master(&mut rng2, &seal_key, SourceProofType::SelfSignature);

        let item = VerificationItem::new(&seal_key, &master, ClaimID::random(), true).unwrap();
        assert!(item.validate(&SignKeypairPublic::from(master.keyset().sign().key().clone())));
        assert!(!item.validate(&SignKeypairPublic::from(foreign.keyset().sign().key().clone())));
    }
}

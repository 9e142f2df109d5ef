//! Contact credentials wrap one claim-data payload, bound into the
//! authority's trust hierarchy by the master's signatures. The nym's public
//! claims are derived by merging every active contact credential's payload.

use crate::{
    crypto::base::{SecretKey, SignKeypairPublic},
    error::Result,
    identity::{
        claim::ClaimData,
        credential::{
            id_for_preimage, primary::PrimaryCredential, serialize_form, CredentialCommon, CredentialID, CredentialMode, CredentialMut,
            CredentialRole, CredentialSignature, SignatureRole,
        },
    },
    util::{ser::SerdeBinary, Public},
};
use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use serde_derive::{Deserialize, Serialize};

/// A credential carrying claim data. Contact credentials hold no keys of
/// their own; both their self-signature and their master signature are made
/// with the master's signing key.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct ContactCredential {
    /// The fields every credential shares.
    #[rasn(tag(explicit(0)))]
    common: CredentialCommon,
    /// The claim data payload.
    #[rasn(tag(explicit(1)))]
    claim_data: ClaimData,
}

impl ContactCredential {
    /// Create a new contact credential signed by the given master.
    pub fn generate(seal_key: &SecretKey, master: &PrimaryCredential, version: u32, claim_data: ClaimData) -> Result<Self> {
        let master_id = master.id()?;
        let mut cred = Self {
            common: CredentialCommon::new(version, CredentialRole::Contact, CredentialMode::Public, Some(master_id.clone())),
            claim_data,
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
    /// master.
    pub fn validate(&self, master_id: &CredentialID, master_key: &SignKeypairPublic) -> bool {
        if self.common.version() == &0 {
            return false;
        }
        if self.common.role() != &CredentialRole::Contact || self.common.mode() != &CredentialMode::Public {
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
        self.common.verify_master_signature(master_id, master_key, &preimage)
    }
}

impl CredentialMut for ContactCredential {
    fn common_mut(&mut self) -> &mut CredentialCommon {
        &mut self.common
    }
}

impl Public for ContactCredential {
    fn strip_private(&self) -> Self {
        self.clone()
    }

    fn has_private(&self) -> bool {
        false
    }
}

impl SerdeBinary for ContactCredential {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::identity::claim::tests::email_claim;
    use crate::identity::credential::primary::{tests::make_master, SourceProofType};
    use crate::identity::source::NymID;

    #[test]
    fn contact_credential_lifecycle() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let master = make_master(&mut rng, &seal_key, SourceProofType::SelfSignature);
        let master_id = master.id().unwrap();
        let master_pub = SignKeypairPublic::from(master.keyset().sign().key().clone());

        let data = ClaimData::new(NymID::random()).add_item(email_claim("claims@r.us", true));
        let cred = ContactCredential::generate(&seal_key, &master, 1, data.clone()).unwrap();
        assert!(cred.validate(&master_id, &master_pub));
        assert_eq!(cred.claim_data(), &data);

        // tampering with the payload breaks both signatures
        let mut tampered = cred.clone();
        tampered.set_claim_data(ClaimData::new(NymID::random()));
        assert!(!tampered.validate(&master_id, &master_pub));
    }

    #[test]
    fn contact_credential_der_roundtrip() {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let master = make_master(&mut rng, &seal_key, SourceProofType::SelfSignature);
        let data = ClaimData::new(NymID::random()).add_item(email_claim("round@trip.io", false));
        let cred = ContactCredential::generate(&seal_key, &master, 1, data).unwrap();
        let ser = cred.serialize_binary().unwrap();
        let cred2 = ContactCredential::deserialize_binary(&ser).unwrap();
        assert_eq!(cred, cred2);
    }
}

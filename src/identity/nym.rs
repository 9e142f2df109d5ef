//! The nym: the top-level self-sovereign identity aggregate. A nym owns its
//! identity source, one or more credential authorities, the claim data
//! derived from them, and the alias/revision/revocation bookkeeping. It is
//! the single entry point external collaborators use.
//!
//! All operations are synchronous. Mutators take `&mut self`, so credential
//! additions on one nym are naturally linearized and `revision` can only
//! climb. The one piece of interior mutability is the claims cache, which
//! read-only callers may populate.

use crate::{
    crypto::base::{CryptoKeypairPublic, KeyAlgo, Sealed, SecretKey, SessionTag},
    error::{Error, Result},
    identity::{
        authority::{Authority, SerializedAuthority},
        claim::{Claim, ClaimAttribute, ClaimData, ClaimKind, SectionKind},
        credential::{key::{Key, KeyRole}, primary::Capability, CredentialID},
        source::{NymID, NymSource, PaymentCode},
        NymParams,
    },
    store::CredentialStore,
    util::ser::SerdeBinary,
};
use rand::{CryptoRng, RngCore};
use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use serde_derive::{Deserialize, Serialize};
use std::sync::RwLock;

/// The version stamped onto newly created nym wire forms.
pub const NYM_VERSION_DEFAULT: u32 = 1;

/// A self-sovereign identity: source, authorities, claims, bookkeeping.
#[derive(Debug, getset::Getters)]
#[getset(get = "pub")]
pub struct Nym {
    /// The nym's identifier, always equal to the source-derived id.
    id: NymID,
    /// The identity source. Immutable for the life of the nym.
    source: NymSource,
    /// The active authorities.
    authorities: Vec<Authority>,
    /// Revoked authorities. Kept around so old messages stay decryptable.
    revoked_authorities: Vec<Authority>,
    /// Every credential id this nym has ever revoked. Additive, never pruned.
    revoked_credential_ids: Vec<CredentialID>,
    /// A friendly label. Not part of any proof.
    alias: Option<String>,
    /// Bumped by every mutation. Monotonic under `&mut self`.
    revision: u64,
    /// Cache for the derived claim data.
    #[getset(skip)]
    claims_cache: RwLock<Option<ClaimData>>,
}

impl Nym {
    /// Build a new nym from construction parameters: source and first
    /// authority together, optionally seeded with a scope claim when a
    /// display name was supplied.
    pub fn from_params<R: RngCore + CryptoRng>(rng: &mut R, seal_key: &SecretKey, params: &NymParams, reason: &str) -> Result<Self> {
        let (authority, source) = Authority::create(rng, seal_key, params, reason)?;
        let id = source.derive_id()?;
        tracing::info!(%id, reason, "nym: created");
        let mut nym = Self {
            id,
            source,
            authorities: vec![authority],
            revoked_authorities: Vec::new(),
            revoked_credential_ids: Vec::new(),
            alias: params.display_name().clone(),
            revision: 1,
            claims_cache: RwLock::new(None),
        };
        if let Some(name) = params.display_name() {
            let name = name.clone();
            nym.set_scope(seal_key, *params.scope(), name, reason)?;
        }
        Ok(nym)
    }

    /// The derived claim data: every active authority's contact payloads,
    /// folded newest-first with merge so the most recently committed claim
    /// set takes precedence. Cached until the next mutation.
    pub fn claims(&self) -> ClaimData {
        {
            let guard = self.claims_cache.read().unwrap_or_else(|poison| poison.into_inner());
            if let Some(data) = guard.as_ref() {
                return data.clone();
            }
        }
        let derived = self.derive_claims();
        let mut guard = self.claims_cache.write().unwrap_or_else(|poison| poison.into_inner());
        *guard = Some(derived.clone());
        derived
    }

    fn derive_claims(&self) -> ClaimData {
        let mut data = ClaimData::new(self.id.clone());
        for authority in &self.authorities {
            for contact in authority.contacts().iter().rev() {
                data = data + contact.claim_data().clone();
            }
        }
        data
    }

    fn invalidate_claims(&self) {
        let mut guard = self.claims_cache.write().unwrap_or_else(|poison| poison.into_inner());
        *guard = None;
    }

    /// Commit a new claim data value through the first authority able to sign
    /// child credentials. A nym with no capable authority is immutable.
    fn commit_claims(&mut self, seal_key: &SecretKey, claim_data: ClaimData, reason: &str) -> Result<()> {
        let authority = self
            .authorities
            .iter_mut()
            .find(|authority| authority.has_capability(Capability::SignChildCredentials))
            .ok_or(Error::NymImmutable)?;
        authority.add_contact(seal_key, claim_data, reason)?;
        self.invalidate_claims();
        self.revision += 1;
        Ok(())
    }

    /// Insert a claim into the nym's claim data and commit the result.
    pub fn add_claim(&mut self, seal_key: &SecretKey, claim: Claim, reason: &str) -> Result<()> {
        let new_data = self.claims().add_item(claim);
        self.commit_claims(seal_key, new_data, reason)
    }

    /// Remove a claim from the nym's claim data and commit the result.
    pub fn delete_claim(&mut self, seal_key: &SecretKey, id: &crate::identity::claim::ClaimID, reason: &str) -> Result<()> {
        let new_data = self.claims().delete(id);
        self.commit_claims(seal_key, new_data, reason)
    }

    /// Claim an email address.
    pub fn add_email(&mut self, seal_key: &SecretKey, address: String, primary: bool, reason: &str) -> Result<()> {
        let claim = Claim::new(
            SectionKind::Communication,
            ClaimKind::Email,
            address,
            None,
            None,
            claim_attributes(primary),
        )?;
        self.add_claim(seal_key, claim, reason)
    }

    /// Claim a phone number.
    pub fn add_phone(&mut self, seal_key: &SecretKey, number: String, primary: bool, reason: &str) -> Result<()> {
        let claim = Claim::new(
            SectionKind::Communication,
            ClaimKind::Phone,
            number,
            None,
            None,
            claim_attributes(primary),
        )?;
        self.add_claim(seal_key, claim, reason)
    }

    /// Claim a payment code.
    pub fn add_payment_code(&mut self, seal_key: &SecretKey, code: &PaymentCode, primary: bool, reason: &str) -> Result<()> {
        let claim = Claim::new(
            SectionKind::Contract,
            ClaimKind::PaymentCode,
            code.to_base58(),
            None,
            None,
            claim_attributes(primary),
        )?;
        self.add_claim(seal_key, claim, reason)
    }

    /// Claim a social profile handle.
    pub fn add_social_profile(&mut self, seal_key: &SecretKey, handle: String, primary: bool, reason: &str) -> Result<()> {
        let claim = Claim::new(
            SectionKind::Profile,
            ClaimKind::SocialProfile,
            handle,
            None,
            None,
            claim_attributes(primary),
        )?;
        self.add_claim(seal_key, claim, reason)
    }

    /// Declare what kind of entity this nym is, with its display name.
    pub fn set_scope(&mut self, seal_key: &SecretKey, scope: ClaimKind, name: String, reason: &str) -> Result<()> {
        match scope {
            ClaimKind::Individual | ClaimKind::Organization => {}
            _ => return Err(Error::ParamsIncompatible("scope claims must be individual or organization")),
        }
        let claim = Claim::new(SectionKind::Scope, scope, name, None, None, claim_attributes(true))?;
        self.add_claim(seal_key, claim, reason)
    }

    /// Set the nym's common (display) name claim.
    pub fn set_common_name(&mut self, seal_key: &SecretKey, name: String, reason: &str) -> Result<()> {
        let claim = Claim::new(SectionKind::Identifier, ClaimKind::CommonName, name, None, None, claim_attributes(true))?;
        self.add_claim(seal_key, claim, reason)
    }

    /// Set the nym's alias (plain bookkeeping, not a claim).
    pub fn set_alias(&mut self, alias: Option<String>) {
        self.alias = alias;
        self.revision += 1;
    }

    /// True iff every active authority's internal verification passes.
    pub fn verify(&self) -> bool {
        let mut all_ok = true;
        for authority in &self.authorities {
            if !authority.verify_internally(&self.source) {
                all_ok = false;
            }
        }
        all_ok
    }

    /// Scan the active authorities for a keypair (see
    /// [`Authority::get_keypair`]), honoring the nym's revoked-id ledger.
    pub fn get_keypair(&self, role: KeyRole, algo: Option<KeyAlgo>) -> Result<Key> {
        for authority in &self.authorities {
            match authority.get_keypair(role, algo, &self.revoked_credential_ids) {
                Ok(key) => return Ok(key),
                Err(Error::KeypairNotFound) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(Error::KeypairNotFound)
    }

    /// Try each active authority's session unlock, then each revoked one
    /// (revoked authorities may still legitimately decrypt old messages).
    /// First success wins; `None` when nothing matches.
    pub fn unlock(
        &self,
        seal_key: &SecretKey,
        dh_key: &CryptoKeypairPublic,
        tag: &SessionTag,
        algo: KeyAlgo,
        symmetric_key: &Sealed,
        reason: &str,
    ) -> Option<SecretKey> {
        for authority in self.authorities.iter().chain(self.revoked_authorities.iter()) {
            if let Some(key) = authority.unlock(seal_key, dh_key, tag, algo, symmetric_key, reason) {
                return Some(key);
            }
        }
        None
    }

    /// Revoke the contact credentials of every active authority, folding
    /// their ids into the global revoked-id ledger.
    pub fn revoke_contact_credentials(&mut self) -> Vec<CredentialID> {
        let mut ids = Vec::new();
        for authority in self.authorities.iter_mut() {
            ids.extend(authority.revoke_contacts());
        }
        self.revoked_credential_ids.extend(ids.iter().cloned());
        self.invalidate_claims();
        self.revision += 1;
        ids
    }

    /// Revoke the verification credentials of every active authority.
    pub fn revoke_verification_credentials(&mut self) -> Vec<CredentialID> {
        let mut ids = Vec::new();
        for authority in self.authorities.iter_mut() {
            ids.extend(authority.revoke_verifications());
        }
        self.revoked_credential_ids.extend(ids.iter().cloned());
        self.revision += 1;
        ids
    }

    /// Revoke a whole authority by its master id. The authority moves to the
    /// revoked list (it can still decrypt old messages) and every credential
    /// it held lands in the revoked-id ledger.
    pub fn revoke_authority(&mut self, master_id: &CredentialID) -> Result<()> {
        let position = self
            .authorities
            .iter()
            .position(|authority| authority.master_id().ok().as_ref() == Some(master_id))
            .ok_or(Error::AuthorityNotFound)?;
        let authority = self.authorities.remove(position);
        self.revoked_credential_ids.push(master_id.clone());
        for cred in authority.secondaries() {
            if let Ok(id) = cred.id() {
                self.revoked_credential_ids.push(id);
            }
        }
        for cred in authority.contacts() {
            if let Ok(id) = cred.id() {
                self.revoked_credential_ids.push(id);
            }
        }
        for cred in authority.verifications() {
            if let Ok(id) = cred.id() {
                self.revoked_credential_ids.push(id);
            }
        }
        tracing::info!(%master_id, "nym: revoked authority");
        self.revoked_authorities.push(authority);
        self.invalidate_claims();
        self.revision += 1;
        Ok(())
    }

    /// Serialize with all credentials inline.
    pub fn serialize_full(&self) -> Result<SerializedNym> {
        Ok(SerializedNym {
            version: NYM_VERSION_DEFAULT,
            id: self.id.clone(),
            source: self.source.clone(),
            authorities: self.authorities.iter().map(|a| a.serialize_full()).collect::<Result<Vec<_>>>()?,
            revoked_authorities: self
                .revoked_authorities
                .iter()
                .map(|a| a.serialize_full())
                .collect::<Result<Vec<_>>>()?,
            revoked_credential_ids: self.revoked_credential_ids.clone(),
            alias: self.alias.clone(),
            revision: self.revision,
        })
    }

    /// Serialize ids-only, writing every credential through the store.
    pub fn serialize_ids(&self, store: &mut dyn CredentialStore) -> Result<SerializedNym> {
        let mut authorities = Vec::with_capacity(self.authorities.len());
        for authority in &self.authorities {
            authorities.push(authority.serialize_ids(store)?);
        }
        let mut revoked_authorities = Vec::with_capacity(self.revoked_authorities.len());
        for authority in &self.revoked_authorities {
            revoked_authorities.push(authority.serialize_ids(store)?);
        }
        Ok(SerializedNym {
            version: NYM_VERSION_DEFAULT,
            id: self.id.clone(),
            source: self.source.clone(),
            authorities,
            revoked_authorities,
            revoked_credential_ids: self.revoked_credential_ids.clone(),
            alias: self.alias.clone(),
            revision: self.revision,
        })
    }

    /// Rebuild a nym from its wire form, validating that the declared id
    /// equals the source-derived id before accepting anything.
    pub fn from_serialized(serialized: SerializedNym, store: Option<&dyn CredentialStore>) -> Result<Self> {
        let derived = serialized.source.derive_id()?;
        if derived != serialized.id {
            return Err(Error::NymIDMismatch);
        }
        let mut authorities = Vec::with_capacity(serialized.authorities.len());
        for ser in serialized.authorities {
            authorities.push(Authority::from_serialized(ser, store)?);
        }
        let mut revoked_authorities = Vec::with_capacity(serialized.revoked_authorities.len());
        for ser in serialized.revoked_authorities {
            revoked_authorities.push(Authority::from_serialized(ser, store)?);
        }
        Ok(Self {
            id: serialized.id,
            source: serialized.source,
            authorities,
            revoked_authorities,
            revoked_credential_ids: serialized.revoked_credential_ids,
            alias: serialized.alias,
            revision: serialized.revision,
            claims_cache: RwLock::new(None),
        })
    }
}

fn claim_attributes(primary: bool) -> Vec<ClaimAttribute> {
    if primary {
        vec![ClaimAttribute::Active, ClaimAttribute::Primary]
    } else {
        vec![ClaimAttribute::Active]
    }
}

impl Clone for Nym {
    fn clone(&self) -> Self {
        let cached = self
            .claims_cache
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone();
        Self {
            id: self.id.clone(),
            source: self.source.clone(),
            authorities: self.authorities.clone(),
            revoked_authorities: self.revoked_authorities.clone(),
            revoked_credential_ids: self.revoked_credential_ids.clone(),
            alias: self.alias.clone(),
            revision: self.revision,
            claims_cache: RwLock::new(cached),
        }
    }
}

impl PartialEq for Nym {
    fn eq(&self, other: &Self) -> bool {
        // the claims cache is a derived view, not part of identity
        self.id == other.id
            && self.source == other.source
            && self.authorities == other.authorities
            && self.revoked_authorities == other.revoked_authorities
            && self.revoked_credential_ids == other.revoked_credential_ids
            && self.alias == other.alias
            && self.revision == other.revision
    }
}

/// A nym's wire form.
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters)]
#[getset(get = "pub")]
pub struct SerializedNym {
    /// The nym wire format version.
    #[rasn(tag(explicit(0)))]
    version: u32,
    /// The declared nym id. Must match the source derivation.
    #[rasn(tag(explicit(1)))]
    id: NymID,
    /// The identity source.
    #[rasn(tag(explicit(2)))]
    source: NymSource,
    /// Active authorities.
    #[rasn(tag(explicit(3)))]
    authorities: Vec<SerializedAuthority>,
    /// Revoked authorities.
    #[rasn(tag(explicit(4)))]
    revoked_authorities: Vec<SerializedAuthority>,
    /// The global revoked-credential-id ledger.
    #[rasn(tag(explicit(5)))]
    revoked_credential_ids: Vec<CredentialID>,
    /// The nym's alias.
    #[rasn(tag(explicit(6)))]
    alias: Option<String>,
    /// The nym's revision counter.
    #[rasn(tag(explicit(7)))]
    revision: u64,
}

impl SerdeBinary for SerializedNym {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto::base::CryptoKeypair;
    use crate::store::MemoryCredentialStore;
    use crate::util::Public;

    pub(crate) fn setup_nym(display_name: Option<&str>) -> (rand_chacha::ChaCha20Rng, SecretKey, Nym) {
        let mut rng = crate::util::test::rng();
        let seal_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let mut params = NymParams::default();
        if let Some(name) = display_name {
            params = params.with_display_name(name.into());
        }
        let nym = Nym::from_params(&mut rng, &seal_key, &params, "test: setup").unwrap();
        (rng, seal_key, nym)
    }

    #[test]
    fn nym_id_matches_source_derivation() {
        let (_rng, _seal_key, nym) = setup_nym(None);
        assert_eq!(nym.id(), &nym.source().derive_id().unwrap());
        assert!(nym.verify());
    }

    #[test]
    fn nym_from_params_seeds_scope_claim() {
        let (_rng, _seal_key, nym) = setup_nym(Some("Marty Malt"));
        let claims = nym.claims();
        let best = claims.best(SectionKind::Scope, ClaimKind::Individual).unwrap();
        assert_eq!(best.value(), "Marty Malt");
        assert!(best.is_primary());
        assert_eq!(nym.alias().as_deref(), Some("Marty Malt"));
    }

    #[test]
    fn nym_claim_mutators_and_revision() {
        let (_rng, seal_key, mut nym) = setup_nym(None);
        let revision0 = *nym.revision();
        nym.add_email(&seal_key, "butch@jerry.net".into(), false, "test: email").unwrap();
        nym.add_phone(&seal_key, "+1 831-555-1237".into(), false, "test: phone").unwrap();
        nym.set_common_name(&seal_key, "Butch".into(), "test: name").unwrap();
        assert!(*nym.revision() > revision0);
        assert!(nym.verify());

        let claims = nym.claims();
        assert_eq!(
            claims.best(SectionKind::Communication, ClaimKind::Email).unwrap().value(),
            "butch@jerry.net"
        );
        assert_eq!(
            claims.best(SectionKind::Identifier, ClaimKind::CommonName).unwrap().value(),
            "Butch"
        );
        assert_eq!(*nym.revision(), revision0 + 3);
    }

    #[test]
    fn nym_primary_moves_with_new_commits() {
        let (_rng, seal_key, mut nym) = setup_nym(None);
        nym.add_email(&seal_key, "first@in.line".into(), false, "test: first").unwrap();
        nym.add_email(&seal_key, "second@in.line".into(), true, "test: second").unwrap();
        let claims = nym.claims();
        let group = claims.group(SectionKind::Communication, ClaimKind::Email).unwrap();
        assert_eq!(group.claims().len(), 2);
        let primaries: Vec<_> = group.claims().iter().filter(|claim| claim.is_primary()).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].value(), "second@in.line");
    }

    #[test]
    fn nym_payment_code_and_social_claims() {
        let (mut rng, seal_key, mut nym) = setup_nym(None);
        let code = PaymentCode::generate(&mut rng, &seal_key, 1).unwrap();
        nym.add_payment_code(&seal_key, &code, true, "test: code").unwrap();
        nym.add_social_profile(&seal_key, "@butch".into(), false, "test: social").unwrap();
        let claims = nym.claims();
        assert_eq!(
            claims.best(SectionKind::Contract, ClaimKind::PaymentCode).unwrap().value(),
            &code.to_base58()
        );
        assert_eq!(claims.best(SectionKind::Profile, ClaimKind::SocialProfile).unwrap().value(), "@butch");
        // the social profile claim forces claim data (and authority) versions up
        assert!(claims.version() >= &3);
    }

    #[test]
    fn nym_scope_rejects_non_scope_kinds() {
        let (_rng, seal_key, mut nym) = setup_nym(None);
        let res = nym.set_scope(&seal_key, ClaimKind::Email, "nope".into(), "test: bad scope");
        assert_eq!(
            res.err(),
            Some(Error::ParamsIncompatible("scope claims must be individual or organization"))
        );
    }

    #[test]
    fn nym_immutable_without_capable_authority() {
        let (_rng, seal_key, nym) = setup_nym(None);
        // a public-only rendition of the nym has no signing capability left
        let mut public_nym = nym.clone();
        public_nym.authorities = public_nym.authorities.iter().map(|a| a.strip_private()).collect();
        let res = public_nym.add_email(&seal_key, "cant@do.it".into(), false, "test: immutable");
        assert_eq!(res.err(), Some(Error::NymImmutable));
    }

    #[test]
    fn nym_revoke_contacts_invalidates_claims() {
        let (_rng, seal_key, mut nym) = setup_nym(None);
        nym.add_email(&seal_key, "ephemeral@claims.io".into(), false, "test: email").unwrap();
        assert!(nym.claims().best(SectionKind::Communication, ClaimKind::Email).is_some());
        let ids = nym.revoke_contact_credentials();
        assert!(!ids.is_empty());
        assert!(nym.claims().best(SectionKind::Communication, ClaimKind::Email).is_none());
        assert_eq!(nym.revoked_credential_ids().len(), ids.len());
        // idempotence
        let ids2 = nym.revoke_contact_credentials();
        assert!(ids2.is_empty());
    }

    #[test]
    fn nym_unlock_tries_revoked_authorities() {
        let (mut rng, seal_key, mut nym) = setup_nym(None);
        let master_id = nym.authorities()[0].master_id().unwrap();
        let encrypt_pub = CryptoKeypairPublic::from(nym.authorities()[0].master().keyset().encrypt().key().clone());

        let mut sender_rng = crate::util::test::rng_seeded(23);
        let sender_seal = SecretKey::new_xchacha20poly1305(&mut sender_rng).unwrap();
        let sender_keypair = CryptoKeypair::new_secp256k1xchacha20poly1305(&mut sender_rng, &sender_seal).unwrap();
        let tag = sender_keypair.session_tag(&sender_seal, &encrypt_pub, master_id.as_bytes()).unwrap();
        let session_key = sender_keypair.session_key(&sender_seal, &encrypt_pub).unwrap();
        let payload_key = SecretKey::new_xchacha20poly1305(&mut rng).unwrap();
        let payload_bytes: [u8; 32] = payload_key.as_ref().try_into().unwrap();
        let sealed = session_key.seal(&mut rng, &payload_bytes[..]).unwrap();
        let sender_pub = CryptoKeypairPublic::from(sender_keypair);

        // works while the authority is active
        assert!(nym.unlock(&seal_key, &sender_pub, &tag, KeyAlgo::Secp256k1, &sealed, "test").is_some());
        // and still works after the authority is revoked
        nym.revoke_authority(&master_id).unwrap();
        assert!(nym.authorities().is_empty());
        assert_eq!(nym.revoked_authorities().len(), 1);
        assert!(nym.unlock(&seal_key, &sender_pub, &tag, KeyAlgo::Secp256k1, &sealed, "test").is_some());
        // revoking an unknown authority is an error
        assert_eq!(nym.revoke_authority(&master_id).err(), Some(Error::AuthorityNotFound));
    }

    #[test]
    fn nym_serialize_full_roundtrip() {
        let (_rng, seal_key, mut nym) = setup_nym(Some("Roundtrip Rita"));
        nym.add_email(&seal_key, "rita@trips.io".into(), true, "test: email").unwrap();
        let serialized = nym.serialize_full().unwrap();
        let bytes = serialized.serialize_binary().unwrap();
        let serialized2 = SerializedNym::deserialize_binary(&bytes).unwrap();
        let nym2 = Nym::from_serialized(serialized2, None).unwrap();
        assert_eq!(nym, nym2);
        assert!(nym2.verify());
        assert_eq!(nym2.claims(), nym.claims());
    }

    #[test]
    fn nym_serialize_ids_roundtrip() {
        let (_rng, seal_key, mut nym) = setup_nym(None);
        nym.add_email(&seal_key, "stored@creds.io".into(), true, "test: email").unwrap();
        let mut store = MemoryCredentialStore::new();
        let serialized = nym.serialize_ids(&mut store).unwrap();
        let nym2 = Nym::from_serialized(serialized, Some(&store)).unwrap();
        assert_eq!(nym, nym2);
        assert!(nym2.verify());
    }

    #[test]
    fn nym_from_serialized_id_mismatch() {
        let (_rng, _seal_key, nym) = setup_nym(None);
        let mut serialized = nym.serialize_full().unwrap();
        serialized.id = NymID::random();
        let res = Nym::from_serialized(serialized, None);
        assert_eq!(res.err(), Some(Error::NymIDMismatch));
    }
}

//! An authority is a credential trust hierarchy rooted at exactly one master
//! credential. It is the single owner of that master and the orchestrator of
//! every child-credential lifecycle operation: creation (with algorithm
//! fallback), capability checks, key lookup, session-key unlock, revocation,
//! and serialization in full or ids-only form.

use crate::{
    crypto::base::{CryptoKeypair, CryptoKeypairPublic, KeyAlgo, Sealed, SecretKey, SessionTag, SignKeypairPublic},
    error::{Error, Result},
    identity::{
        claim::ClaimData,
        credential::{
            contact::ContactCredential,
            key::{Key, KeyRole},
            primary::{Capability, PrimaryCredential, SourceProofType},
            secondary::SecondaryCredential,
            verification::{VerificationCredential, VerificationSet},
            Credential, CredentialID, CredentialSignature, SignatureRole,
        },
        source::{NymSource, PaymentCode},
        NymParams, SourceType,
    },
    store::CredentialStore,
    util::{ser::SerdeBinary, Public},
};
use rand::{CryptoRng, RngCore};
use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use serde_derive::{Deserialize, Serialize};

/// The version stamped onto newly created authorities.
pub const AUTHORITY_VERSION_DEFAULT: u32 = 1;
/// The version stamped onto newly created credentials.
pub const CREDENTIAL_VERSION_DEFAULT: u32 = 1;
/// The version of newly built identity sources.
pub const SOURCE_VERSION_DEFAULT: u32 = 1;

/// For each authority version, the highest claim data version it can carry.
/// Consulted when contact credentials are added so the authority's effective
/// version tracks its payloads.
const AUTHORITY_CLAIM_VERSIONS: &[(u32, u32)] = &[(1, 2), (2, 3), (3, 4)];

/// The minimum authority version able to carry the given claim data version.
fn required_authority_version(claim_data_version: u32) -> u32 {
    for (authority_version, max_claim_version) in AUTHORITY_CLAIM_VERSIONS {
        if claim_data_version <= *max_claim_version {
            return *authority_version;
        }
    }
    AUTHORITY_CLAIM_VERSIONS
        .last()
        .map(|(authority_version, _)| *authority_version)
        .unwrap_or(AUTHORITY_VERSION_DEFAULT)
}

/// A credential trust hierarchy: one master credential plus its child key,
/// contact, and verification credentials, and the revocation graveyard.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct Authority {
    /// The authority format version. Tracks the payloads it carries.
    #[rasn(tag(explicit(0)))]
    version: u32,
    /// The next free child-credential slot.
    #[rasn(tag(explicit(1)))]
    index: u32,
    /// The master credential. Created once, never replaced.
    #[rasn(tag(explicit(2)))]
    master: PrimaryCredential,
    /// Child key credentials, in insertion order.
    #[rasn(tag(explicit(3)))]
    secondaries: Vec<SecondaryCredential>,
    /// Contact credentials, in insertion order.
    #[rasn(tag(explicit(4)))]
    contacts: Vec<ContactCredential>,
    /// Verification credentials, in insertion order.
    #[rasn(tag(explicit(5)))]
    verifications: Vec<VerificationCredential>,
    /// Revoked credentials. Additive bookkeeping; nothing here is ever
    /// deleted or reactivated.
    #[rasn(tag(explicit(6)))]
    revoked: Vec<Credential>,
}

impl Authority {
    /// Create a new authority from construction parameters: master first
    /// (slot 0), then one secondary key credential, then contact and
    /// verification credentials when the params supply payloads. Returns the
    /// authority together with the identity source it constructed.
    pub fn create<R: RngCore + CryptoRng>(
        rng: &mut R,
        seal_key: &SecretKey,
        params: &NymParams,
        reason: &str,
    ) -> Result<(Self, NymSource)> {
        if params.source_type() == &SourceType::Bip47 && params.credential_type() == &crate::identity::CredentialType::Legacy {
            return Err(Error::ParamsIncompatible("payment-code sources require HD credentials"));
        }
        tracing::info!(reason, "authority: creating");
        let proof_type = match params.source_type() {
            SourceType::PubKey => SourceProofType::SelfSignature,
            SourceType::Bip47 => SourceProofType::Signature,
        };
        let derivation = params.derivation_for(0);
        let mut master = PrimaryCredential::generate(
            rng,
            seal_key,
            *params.algorithm(),
            CREDENTIAL_VERSION_DEFAULT,
            proof_type,
            derivation.as_ref(),
        )?;
        let source = match params.source_type() {
            SourceType::PubKey => NymSource::new_pubkey(
                SOURCE_VERSION_DEFAULT,
                SignKeypairPublic::from(master.keyset().sign().key().clone()),
            ),
            SourceType::Bip47 => {
                let code = match params.seed() {
                    Some(seed) => PaymentCode::from_seed(rng, seal_key, *params.payment_code_version(), seed.as_slice())?,
                    None => PaymentCode::generate(rng, seal_key, *params.payment_code_version())?,
                };
                NymSource::new_bip47(SOURCE_VERSION_DEFAULT, code)
            }
        };
        if let NymSource::Bip47 { .. } = source {
            let master_id = master.id()?;
            let sig = source.sign(seal_key, &master)?;
            master.attach_source_signature(CredentialSignature::new(SignatureRole::Source, master_id, sig));
        }
        let mut authority = Self {
            version: AUTHORITY_VERSION_DEFAULT,
            index: 1,
            master,
            secondaries: Vec::new(),
            contacts: Vec::new(),
            verifications: Vec::new(),
            revoked: Vec::new(),
        };
        authority.add_secondary(rng, seal_key, params, reason)?;
        if let Some(contact_data) = params.contact_data() {
            authority.add_contact(seal_key, contact_data.clone(), reason)?;
        }
        if let Some(verification_set) = params.verification_set() {
            authority.add_verification(seal_key, verification_set.clone(), reason)?;
        }
        Ok((authority, source))
    }

    /// The master credential's id.
    pub fn master_id(&self) -> Result<CredentialID> {
        self.master.id()
    }

    /// Whether this authority's master grants a capability.
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.master.has_capability(capability)
    }

    /// Add a secondary key credential in the next free slot. Requires the
    /// master to be able to sign child credentials.
    pub fn add_secondary<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        seal_key: &SecretKey,
        params: &NymParams,
        reason: &str,
    ) -> Result<CredentialID> {
        if !self.has_capability(Capability::SignChildCredentials) {
            return Err(Error::AuthorityCapabilityDenied);
        }
        let slot = self.index;
        let master_id = self.master_id()?;
        let derivation = params.derivation_for(slot);
        let mut secondary = SecondaryCredential::generate(
            rng,
            seal_key,
            *params.algorithm(),
            CREDENTIAL_VERSION_DEFAULT,
            master_id.clone(),
            slot,
            derivation.as_ref(),
        )?;
        let preimage = secondary.serialize_public_unsigned()?;
        let sig = self.master.keyset().sign().key().sign(seal_key, &preimage)?;
        secondary.attach_master_signature(CredentialSignature::new(SignatureRole::Master, master_id, sig));
        let id = secondary.id()?;
        tracing::debug!(%id, slot, reason, "authority: added secondary credential");
        self.secondaries.push(secondary);
        self.index += 1;
        Ok(id)
    }

    /// Add a contact credential carrying the given claim data. Additive: no
    /// existing contact credential is replaced. The authority's effective
    /// version rises to whatever the payload requires.
    pub fn add_contact(&mut self, seal_key: &SecretKey, claim_data: ClaimData, reason: &str) -> Result<bool> {
        if !self.has_capability(Capability::SignChildCredentials) {
            return Err(Error::AuthorityCapabilityDenied);
        }
        self.version = self.version.max(required_authority_version(*claim_data.version()));
        let cred = ContactCredential::generate(seal_key, &self.master, *claim_data.version(), claim_data)?;
        tracing::debug!(id = %cred.id()?, reason, "authority: added contact credential");
        self.contacts.push(cred);
        Ok(true)
    }

    /// Add a verification credential carrying the given attestation set.
    pub fn add_verification(&mut self, seal_key: &SecretKey, verification_set: VerificationSet, reason: &str) -> Result<bool> {
        if !self.has_capability(Capability::SignChildCredentials) {
            return Err(Error::AuthorityCapabilityDenied);
        }
        let cred = VerificationCredential::generate(seal_key, &self.master, *verification_set.version(), verification_set)?;
        tracing::debug!(id = %cred.id()?, reason, "authority: added verification credential");
        self.verifications.push(cred);
        Ok(true)
    }

    /// Move every active contact credential into the revocation graveyard,
    /// returning their ids for the nym's global revoked-id ledger. Idempotent:
    /// a second call returns an empty list.
    pub fn revoke_contacts(&mut self) -> Vec<CredentialID> {
        let drained: Vec<ContactCredential> = self.contacts.drain(..).collect();
        let mut ids = Vec::with_capacity(drained.len());
        for cred in drained {
            if let Ok(id) = cred.id() {
                ids.push(id);
            }
            self.revoked.push(Credential::Contact(cred));
        }
        if !ids.is_empty() {
            tracing::info!(count = ids.len(), "authority: revoked contact credentials");
        }
        ids
    }

    /// Move every active verification credential into the revocation
    /// graveyard, returning their ids. Idempotent.
    pub fn revoke_verifications(&mut self) -> Vec<CredentialID> {
        let drained: Vec<VerificationCredential> = self.verifications.drain(..).collect();
        let mut ids = Vec::with_capacity(drained.len());
        for cred in drained {
            if let Ok(id) = cred.id() {
                ids.push(id);
            }
            self.revoked.push(Credential::Verification(cred));
        }
        if !ids.is_empty() {
            tracing::info!(count = ids.len(), "authority: revoked verification credentials");
        }
        ids
    }

    /// Scan secondary credentials in insertion order for the first
    /// capability-bearing keypair matching the requested role (and algorithm,
    /// when one is named), skipping ids in the caller's revoked list.
    pub fn get_keypair(&self, role: KeyRole, algo: Option<KeyAlgo>, revoked_ids: &[CredentialID]) -> Result<Key> {
        for secondary in &self.secondaries {
            let id = secondary.id()?;
            if revoked_ids.contains(&id) {
                continue;
            }
            if let Some(algo) = algo {
                if secondary.algo() != &algo {
                    continue;
                }
            }
            let key = secondary.keypair(role);
            let capable = match &key {
                Key::Sign(keypair) => keypair.has_private(),
                Key::Crypto(keypair) => keypair.has_private(),
            };
            if capable {
                return Ok(key);
            }
        }
        Err(Error::KeypairNotFound)
    }

    /// Try to unlock a sealed symmetric key that was encrypted to "this
    /// authority": for each encryption-capable credential of the requested
    /// algorithm, recompute the session tag from the sender's DH key and our
    /// master id; on a constant-time match, derive the session key and open
    /// the payload. Returns the recovered key on the first success, `None`
    /// when no credential matches. Credentials of other algorithms are
    /// skipped silently, even when a compatible key exists.
    pub fn unlock(
        &self,
        seal_key: &SecretKey,
        dh_key: &CryptoKeypairPublic,
        tag: &SessionTag,
        algo: KeyAlgo,
        symmetric_key: &Sealed,
        reason: &str,
    ) -> Option<SecretKey> {
        let master_id = match self.master_id() {
            Ok(id) => id,
            Err(_) => return None,
        };
        let mut candidates: Vec<&CryptoKeypair> = Vec::new();
        if self.master.algo() == &algo {
            candidates.push(self.master.keyset().encrypt().key());
        }
        for secondary in &self.secondaries {
            if secondary.algo() == &algo {
                candidates.push(secondary.keyset().encrypt().key());
            }
        }
        for keypair in candidates {
            let computed = match keypair.session_tag(seal_key, dh_key, master_id.as_bytes()) {
                Ok(computed) => computed,
                Err(_) => continue,
            };
            if !computed.verify(tag) {
                continue;
            }
            let session_key = match keypair.session_key(seal_key, dh_key) {
                Ok(key) => key,
                Err(_) => continue,
            };
            let opened = match session_key.open(symmetric_key) {
                Ok(bytes) => bytes,
                Err(_) => continue,
            };
            let key_bytes: [u8; 32] = match opened.as_slice().try_into() {
                Ok(arr) => arr,
                Err(_) => continue,
            };
            tracing::debug!(reason, "authority: session unlock succeeded");
            return SecretKey::new_xchacha20poly1305_from_bytes(key_bytes).ok();
        }
        None
    }

    /// Validate the whole hierarchy: the master (including its source proof),
    /// then every active child credential independently. A failing credential
    /// is reported and evaluation continues, so the diagnostics are complete.
    pub fn verify_internally(&self, source: &NymSource) -> bool {
        let mut all_ok = true;
        if !self.master.validate() {
            tracing::warn!("authority: master credential failed validation");
            all_ok = false;
        }
        if !self.master.verify_against_source(source) {
            tracing::warn!("authority: master credential failed source proof");
            all_ok = false;
        }
        let master_id = match self.master_id() {
            Ok(id) => id,
            Err(_) => return false,
        };
        let master_key = SignKeypairPublic::from(self.master.keyset().sign().key().clone());
        for secondary in &self.secondaries {
            if !secondary.validate(&master_id, &master_key) {
                tracing::warn!(index = secondary.cred_index(), "authority: secondary credential failed validation");
                all_ok = false;
            }
        }
        for contact in &self.contacts {
            if !contact.validate(&master_id, &master_key) {
                tracing::warn!("authority: contact credential failed validation");
                all_ok = false;
            }
        }
        for verification in &self.verifications {
            if !verification.validate(&master_id, &master_key) {
                tracing::warn!("authority: verification credential failed validation");
                all_ok = false;
            }
        }
        all_ok
    }

    /// Serialize with all credentials inline.
    pub fn serialize_full(&self) -> Result<SerializedAuthority> {
        Ok(SerializedAuthority::Full(self.clone()))
    }

    /// Serialize ids-only: every credential is written to the store and the
    /// wire form carries only the ids.
    pub fn serialize_ids(&self, store: &mut dyn CredentialStore) -> Result<SerializedAuthority> {
        let mut save = |credential: Credential| -> Result<CredentialID> {
            let id = credential.id()?;
            if !store.save(&id, &credential.serialize_binary()?) {
                return Err(Error::CredentialStoreFailed(id.as_string()));
            }
            Ok(id)
        };
        let master_id = save(Credential::Primary(self.master.clone()))?;
        let mut secondary_ids = Vec::with_capacity(self.secondaries.len());
        for cred in &self.secondaries {
            secondary_ids.push(save(Credential::Secondary(cred.clone()))?);
        }
        let mut contact_ids = Vec::with_capacity(self.contacts.len());
        for cred in &self.contacts {
            contact_ids.push(save(Credential::Contact(cred.clone()))?);
        }
        let mut verification_ids = Vec::with_capacity(self.verifications.len());
        for cred in &self.verifications {
            verification_ids.push(save(Credential::Verification(cred.clone()))?);
        }
        let mut revoked_ids = Vec::with_capacity(self.revoked.len());
        for cred in &self.revoked {
            revoked_ids.push(save(cred.clone())?);
        }
        Ok(SerializedAuthority::IdsOnly(AuthorityIds {
            version: self.version,
            index: self.index,
            master_id,
            secondary_ids,
            contact_ids,
            verification_ids,
            revoked_ids,
        }))
    }

    /// Rebuild an authority from its wire form. Ids-only forms pull every
    /// credential from the store; a single missing id fails the whole call
    /// rather than producing a partially populated authority.
    pub fn from_serialized(serialized: SerializedAuthority, store: Option<&dyn CredentialStore>) -> Result<Self> {
        match serialized {
            SerializedAuthority::Full(mut authority) => {
                authority.repair_versions();
                Ok(authority)
            }
            SerializedAuthority::IdsOnly(ids) => {
                let store = store.ok_or_else(|| Error::CredentialStoreMissing(ids.master_id.as_string()))?;
                let load = |id: &CredentialID| -> Result<Credential> {
                    let bytes = store.load(id).ok_or_else(|| Error::CredentialStoreMissing(id.as_string()))?;
                    Credential::deserialize_binary(&bytes)
                };
                let master = match load(&ids.master_id)? {
                    Credential::Primary(master) => master,
                    _ => Err(Error::ASNDeserialize)?,
                };
                let mut secondaries = Vec::with_capacity(ids.secondary_ids.len());
                for id in &ids.secondary_ids {
                    match load(id)? {
                        Credential::Secondary(cred) => secondaries.push(cred),
                        _ => Err(Error::ASNDeserialize)?,
                    }
                }
                let mut contacts = Vec::with_capacity(ids.contact_ids.len());
                for id in &ids.contact_ids {
                    match load(id)? {
                        Credential::Contact(cred) => contacts.push(cred),
                        _ => Err(Error::ASNDeserialize)?,
                    }
                }
                let mut verifications = Vec::with_capacity(ids.verification_ids.len());
                for id in &ids.verification_ids {
                    match load(id)? {
                        Credential::Verification(cred) => verifications.push(cred),
                        _ => Err(Error::ASNDeserialize)?,
                    }
                }
                let mut revoked = Vec::with_capacity(ids.revoked_ids.len());
                for id in &ids.revoked_ids {
                    revoked.push(load(id)?);
                }
                let mut authority = Self {
                    version: ids.version,
                    index: ids.index,
                    master,
                    secondaries,
                    contacts,
                    verifications,
                    revoked,
                };
                authority.repair_versions();
                Ok(authority)
            }
        }
    }

    /// Upgrade any zero credential/authority versions to the minimums this
    /// build requires.
    fn repair_versions(&mut self) {
        use crate::identity::credential::CredentialMut;
        if self.version == 0 {
            self.version = AUTHORITY_VERSION_DEFAULT;
        }
        self.master.common_mut().repair_version(CREDENTIAL_VERSION_DEFAULT);
        for cred in self.secondaries.iter_mut() {
            cred.common_mut().repair_version(CREDENTIAL_VERSION_DEFAULT);
        }
        for cred in self.contacts.iter_mut() {
            cred.common_mut().repair_version(CREDENTIAL_VERSION_DEFAULT);
        }
        for cred in self.verifications.iter_mut() {
            cred.common_mut().repair_version(CREDENTIAL_VERSION_DEFAULT);
        }
        for cred in self.revoked.iter_mut() {
            cred.repair_version(CREDENTIAL_VERSION_DEFAULT);
        }
    }
}

impl Public for Authority {
    fn strip_private(&self) -> Self {
        Self {
            version: self.version,
            index: self.index,
            master: self.master.strip_private(),
            secondaries: self.secondaries.iter().map(|cred| cred.strip_private()).collect(),
            contacts: self.contacts.clone(),
            verifications: self.verifications.clone(),
            revoked: self.revoked.iter().map(|cred| cred.strip_private()).collect(),
        }
    }

    fn has_private(&self) -> bool {
        self.master.has_private() || self.secondaries.iter().any(|cred| cred.has_private())
    }
}

impl SerdeBinary for Authority {}

/// The ids-only wire form of an authority.
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize)]
pub struct AuthorityIds {
    /// The authority format version.
    #[rasn(tag(explicit(0)))]
    version: u32,
    /// The next free child-credential slot.
    #[rasn(tag(explicit(1)))]
    index: u32,
    /// The master credential's id.
    #[rasn(tag(explicit(2)))]
    master_id: CredentialID,
    /// Ids of child key credentials.
    #[rasn(tag(explicit(3)))]
    secondary_ids: Vec<CredentialID>,
    /// Ids of contact credentials.
    #[rasn(tag(explicit(4)))]
    contact_ids: Vec<CredentialID>,
    /// Ids of verification credentials.
    #[rasn(tag(explicit(5)))]
    verification_ids: Vec<CredentialID>,
    /// Ids of revoked credentials.
    #[rasn(tag(explicit(6)))]
    revoked_ids: Vec<CredentialID>,
}

/// An authority's wire form: full (credentials inline) or ids-only (backed by
/// a credential store).
#[derive(Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(choice)]
pub enum SerializedAuthority {
    /// Every credential inline.
    #[rasn(tag(explicit(0)))]
    Full(Authority),
    /// Credential ids only.
    #[rasn(tag(explicit(1)))]
    IdsOnly(AuthorityIds),
}

impl SerdeBinary for SerializedAuthority {}

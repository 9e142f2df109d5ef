//! The claim data model: a sectioned, grouped, attributed set of verified
//! facts about an identity, derived from an authority's contact credentials.
//!
//! Claims are value types. Every mutation (`add_item`, `delete`,
//! `set_primary`, merge) consumes the value and returns a new one; nothing is
//! edited in place. History is implicit in the call chain, which keeps the
//! merge semantics honest: combining two claim sets can never corrupt either
//! input.

use crate::{
    error::{Error, Result},
    identity::source::NymID,
    util::{
        ser::{self, SerdeBinary, SerText},
        Timestamp,
    },
};
use rasn::{AsnType, Decode, Decoder, Encode, Encoder};
use serde_derive::{Deserialize, Serialize};

object_id! {
    /// A unique identifier for a claim, derived from its content (attributes
    /// excluded, so flipping Primary does not change a claim's identity).
    ClaimID
}

/// The default version for freshly created claim data.
pub const CLAIM_DATA_VERSION_DEFAULT: u32 = 1;
/// The highest claim data version this build understands.
pub const CLAIM_DATA_VERSION_MAX: u32 = 4;

/// The section a claim lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(enumerated)]
pub enum SectionKind {
    /// What kind of entity this nym is (individual, organization, ...).
    Scope,
    /// Names and other identifying labels.
    Identifier,
    /// Ways of reaching the identity: email, phone.
    Communication,
    /// Presence on external platforms.
    Profile,
    /// Payment instruments.
    Contract,
}

/// What a claim asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(enumerated)]
pub enum ClaimKind {
    /// The nym is a person.
    Individual,
    /// The nym is an organization.
    Organization,
    /// A display name.
    CommonName,
    /// An email address.
    Email,
    /// A phone number.
    Phone,
    /// A payment code.
    PaymentCode,
    /// A profile handle on some platform.
    SocialProfile,
    /// A URL.
    Url,
}

impl ClaimKind {
    /// The minimum claim data version that can carry this kind. The lookup is
    /// a plain module-owned table, consulted when claims are inserted.
    pub(crate) fn minimum_data_version(&self) -> u32 {
        match self {
            ClaimKind::Individual | ClaimKind::Organization | ClaimKind::CommonName | ClaimKind::Email | ClaimKind::Phone => 1,
            ClaimKind::PaymentCode | ClaimKind::Url => 2,
            ClaimKind::SocialProfile => 3,
        }
    }
}

/// Flags attached to a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsnType, Encode, Decode, Serialize, Deserialize)]
#[rasn(enumerated)]
pub enum ClaimAttribute {
    /// The claim is currently in effect.
    Active,
    /// The claim is its group's primary.
    Primary,
    /// The claim was added locally and has not been published.
    Local,
}

/// The id preimage: everything that makes a claim *itself*, minus the
/// attributes (which are allowed to change without changing identity).
#[derive(AsnType, Encode, Decode)]
struct ClaimPreimage {
    #[rasn(tag(explicit(0)))]
    section: SectionKind,
    #[rasn(tag(explicit(1)))]
    kind: ClaimKind,
    #[rasn(tag(explicit(2)))]
    value: String,
    #[rasn(tag(explicit(3)))]
    start: Option<Timestamp>,
    #[rasn(tag(explicit(4)))]
    end: Option<Timestamp>,
}

/// A single attributed fact about an identity.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct Claim {
    /// Content-derived id.
    #[rasn(tag(explicit(0)))]
    id: ClaimID,
    /// The section this claim lives under.
    #[rasn(tag(explicit(1)))]
    section: SectionKind,
    /// What this claim asserts.
    #[rasn(tag(explicit(2)))]
    kind: ClaimKind,
    /// The claim's value.
    #[rasn(tag(explicit(3)))]
    value: String,
    /// When the claim takes effect.
    #[rasn(tag(explicit(4)))]
    start: Option<Timestamp>,
    /// When the claim expires.
    #[rasn(tag(explicit(5)))]
    end: Option<Timestamp>,
    /// The claim's flags.
    #[rasn(tag(explicit(6)))]
    attributes: Vec<ClaimAttribute>,
}

impl Claim {
    /// Create a new claim. The id is computed from the claim's content.
    pub fn new(
        section: SectionKind,
        kind: ClaimKind,
        value: String,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
        attributes: Vec<ClaimAttribute>,
    ) -> Result<Self> {
        let preimage = ClaimPreimage {
            section,
            kind,
            value: value.clone(),
            start: start.clone(),
            end: end.clone(),
        };
        let id = ClaimID::from(crate::crypto::base::Hash::new_blake3(&ser::serialize(&preimage)?)?);
        Ok(Self {
            id,
            section,
            kind,
            value,
            start,
            end,
            attributes,
        })
    }

    /// Whether the claim carries the given attribute.
    pub fn has_attribute(&self, attribute: ClaimAttribute) -> bool {
        self.attributes.contains(&attribute)
    }

    /// Whether the claim is active.
    pub fn is_active(&self) -> bool {
        self.has_attribute(ClaimAttribute::Active)
    }

    /// Whether the claim is its group's primary.
    pub fn is_primary(&self) -> bool {
        self.has_attribute(ClaimAttribute::Primary)
    }

    /// Return a copy of this claim carrying the given attribute.
    fn with_attribute(&self, attribute: ClaimAttribute) -> Self {
        let mut claim = self.clone();
        if !claim.attributes.contains(&attribute) {
            claim.attributes.push(attribute);
        }
        claim
    }

    /// Return a copy of this claim without the given attribute.
    fn without_attribute(&self, attribute: ClaimAttribute) -> Self {
        let mut claim = self.clone();
        claim.attributes.retain(|attr| attr != &attribute);
        claim
    }
}

impl SerText for Claim {}

/// All claims sharing one `(section, kind)`. At most one member is primary;
/// a non-empty group always has exactly one primary (enforced on insert).
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct ClaimGroup {
    /// The group's section.
    #[rasn(tag(explicit(0)))]
    section: SectionKind,
    /// The group's claim kind.
    #[rasn(tag(explicit(1)))]
    kind: ClaimKind,
    /// The claims, in insertion order.
    #[rasn(tag(explicit(2)))]
    claims: Vec<Claim>,
}

impl ClaimGroup {
    fn new(section: SectionKind, kind: ClaimKind) -> Self {
        Self {
            section,
            kind,
            claims: Vec::new(),
        }
    }

    /// Find a claim by id.
    pub fn claim(&self, id: &ClaimID) -> Option<&Claim> {
        self.claims.iter().find(|claim| claim.id() == id)
    }

    /// The group's primary claim, if one exists.
    pub fn primary(&self) -> Option<&Claim> {
        self.claims.iter().find(|claim| claim.is_primary())
    }

    /// The best claim in the group: the primary, else the first active claim,
    /// else the first claim by insertion order. Deterministic, never an
    /// error.
    pub fn best(&self) -> Option<&Claim> {
        self.primary()
            .or_else(|| self.claims.iter().find(|claim| claim.is_active()))
            .or_else(|| self.claims.first())
    }

    /// Insert a claim, enforcing the primary invariants: the first claim into
    /// an empty group is forced primary and active regardless of its flags;
    /// inserting a primary claim demotes the previous primary. A claim with
    /// an id already present replaces the old entry in place.
    fn with_claim(mut self, claim: Claim) -> Self {
        let claim = if self.claims.is_empty() {
            claim.with_attribute(ClaimAttribute::Primary).with_attribute(ClaimAttribute::Active)
        } else {
            claim
        };
        if claim.is_primary() {
            self.claims = self
                .claims
                .into_iter()
                .map(|existing| existing.without_attribute(ClaimAttribute::Primary))
                .collect();
        }
        match self.claims.iter().position(|existing| existing.id() == claim.id()) {
            Some(idx) => self.claims[idx] = claim,
            None => self.claims.push(claim),
        }
        self
    }

    /// Remove a claim by id. No re-election happens; a group that loses its
    /// primary simply has none until the next primary insert.
    fn without_claim(mut self, id: &ClaimID) -> Self {
        self.claims.retain(|claim| claim.id() != id);
        self
    }

    /// Demote every primary in the group.
    fn demoted(mut self) -> Self {
        self.claims = self
            .claims
            .into_iter()
            .map(|claim| claim.without_attribute(ClaimAttribute::Primary))
            .collect();
        self
    }

    /// Union another group into this one by claim id. Our primary wins ties:
    /// if we hold a primary, every incoming primary is demoted.
    fn merged(mut self, other: ClaimGroup) -> Self {
        let we_have_primary = self.primary().is_some();
        for incoming in other.claims {
            if self.claims.iter().any(|existing| existing.id() == incoming.id()) {
                continue;
            }
            let incoming = if we_have_primary && incoming.is_primary() {
                incoming.without_attribute(ClaimAttribute::Primary)
            } else {
                incoming
            };
            self.claims.push(incoming);
        }
        self
    }

    fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// The claim groups for one section.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct ClaimSection {
    /// Which section this is.
    #[rasn(tag(explicit(0)))]
    section: SectionKind,
    /// The groups within, keyed by claim kind.
    #[rasn(tag(explicit(1)))]
    groups: Vec<ClaimGroup>,
}

impl ClaimSection {
    fn new(section: SectionKind) -> Self {
        Self {
            section,
            groups: Vec::new(),
        }
    }

    /// Find the group for a claim kind.
    pub fn group(&self, kind: ClaimKind) -> Option<&ClaimGroup> {
        self.groups.iter().find(|group| group.kind() == &kind)
    }

    fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// The merge-capable, versioned collection of all claims for one nym.
#[derive(
    Debug, Clone, PartialEq, AsnType, Encode, Decode, Serialize, Deserialize, getset::Getters, getset::MutGetters, getset::Setters,
)]
#[getset(get = "pub", get_mut = "pub(crate)", set = "pub(crate)")]
pub struct ClaimData {
    /// The claim data format version. Bumped as claims requiring newer
    /// formats are inserted.
    #[rasn(tag(explicit(0)))]
    version: u32,
    /// The nym these claims describe.
    #[rasn(tag(explicit(1)))]
    nym_id: NymID,
    /// The sections within.
    #[rasn(tag(explicit(2)))]
    sections: Vec<ClaimSection>,
}

impl ClaimData {
    /// Create an empty claim set for a nym.
    pub fn new(nym_id: NymID) -> Self {
        Self {
            version: CLAIM_DATA_VERSION_DEFAULT,
            nym_id,
            sections: Vec::new(),
        }
    }

    /// Find a section.
    pub fn section(&self, section: SectionKind) -> Option<&ClaimSection> {
        self.sections.iter().find(|sec| sec.section() == &section)
    }

    /// Find the group for `(section, kind)`.
    pub fn group(&self, section: SectionKind, kind: ClaimKind) -> Option<&ClaimGroup> {
        self.section(section).and_then(|sec| sec.group(kind))
    }

    /// Find a claim anywhere in the set by id.
    pub fn claim(&self, id: &ClaimID) -> Option<&Claim> {
        self.sections
            .iter()
            .flat_map(|sec| sec.groups().iter())
            .find_map(|group| group.claim(id))
    }

    /// Every claim in the set, in section/group/insertion order.
    pub fn claims(&self) -> Vec<&Claim> {
        self.sections
            .iter()
            .flat_map(|sec| sec.groups().iter())
            .flat_map(|group| group.claims().iter())
            .collect()
    }

    /// The best claim for `(section, kind)` (see [`ClaimGroup::best`]).
    pub fn best(&self, section: SectionKind, kind: ClaimKind) -> Option<&Claim> {
        self.group(section, kind).and_then(|group| group.best())
    }

    /// Insert a claim, returning the new claim set. Creates the section and
    /// group as needed and bumps the data version to whatever the claim's
    /// kind requires.
    pub fn add_item(mut self, claim: Claim) -> Self {
        self.version = self.version.max(claim.kind().minimum_data_version());
        let section_kind = *claim.section();
        let kind = *claim.kind();
        let section_idx = match self.sections.iter().position(|sec| sec.section() == &section_kind) {
            Some(idx) => idx,
            None => {
                self.sections.push(ClaimSection::new(section_kind));
                self.sections.len() - 1
            }
        };
        let section = &mut self.sections[section_idx];
        match section.groups.iter().position(|group| group.kind() == &kind) {
            Some(idx) => {
                let group = section.groups.remove(idx);
                section.groups.insert(idx, group.with_claim(claim));
            }
            None => {
                section.groups.push(ClaimGroup::new(section_kind, kind).with_claim(claim));
            }
        }
        self
    }

    /// Remove a claim by id, returning the new claim set. An emptied group is
    /// dropped from its section, and an emptied section from the set.
    pub fn delete(mut self, id: &ClaimID) -> Self {
        self.sections = self
            .sections
            .into_iter()
            .map(|mut section| {
                section.groups = section
                    .groups
                    .into_iter()
                    .map(|group| group.without_claim(id))
                    .filter(|group| !group.is_empty())
                    .collect();
                section
            })
            .filter(|section| !section.is_empty())
            .collect();
        self
    }

    /// Upgrade this claim set's version to the minimum its content requires.
    /// Decoders run this so a payload whose declared version lags behind its
    /// claims never propagates.
    fn repair_version(&mut self) {
        let required = self
            .claims()
            .iter()
            .map(|claim| claim.kind().minimum_data_version())
            .max()
            .unwrap_or(CLAIM_DATA_VERSION_DEFAULT)
            .max(CLAIM_DATA_VERSION_DEFAULT);
        if self.version < required {
            self.version = required;
        }
    }

    /// Make the given claim its group's primary, demoting the previous one.
    pub fn set_primary(mut self, id: &ClaimID) -> Result<Self> {
        let claim = self.claim(id).cloned().ok_or(Error::ClaimNotFound)?;
        let section_kind = *claim.section();
        let kind = *claim.kind();
        let promoted = claim.with_attribute(ClaimAttribute::Primary);
        for section in self.sections.iter_mut() {
            if section.section() != &section_kind {
                continue;
            }
            for group in section.groups.iter_mut() {
                if group.kind() != &kind {
                    continue;
                }
                let demoted = std::mem::replace(group, ClaimGroup::new(section_kind, kind)).demoted();
                *group = demoted.with_claim(promoted.clone());
            }
        }
        Ok(self)
    }
}

/// Merge two claim sets: groups are unioned by claim id, the left operand's
/// primary wins ties, and the version is the max of the two inputs.
impl std::ops::Add for ClaimData {
    type Output = ClaimData;

    fn add(mut self, other: ClaimData) -> Self::Output {
        self.version = self.version.max(other.version);
        for other_section in other.sections {
            let section_kind = *other_section.section();
            match self.sections.iter().position(|sec| sec.section() == &section_kind) {
                Some(sec_idx) => {
                    let mut section = self.sections.remove(sec_idx);
                    for other_group in other_section.groups {
                        let kind = *other_group.kind();
                        match section.groups.iter().position(|group| group.kind() == &kind) {
                            Some(group_idx) => {
                                let group = section.groups.remove(group_idx);
                                section.groups.insert(group_idx, group.merged(other_group));
                            }
                            None => section.groups.push(other_group),
                        }
                    }
                    self.sections.insert(sec_idx, section);
                }
                None => self.sections.push(other_section),
            }
        }
        self
    }
}

impl SerdeBinary for ClaimData {
    fn deserialize_binary(slice: &[u8]) -> Result<Self> {
        let mut data: ClaimData = ser::deserialize(slice)?;
        data.repair_version();
        Ok(data)
    }
}
impl SerText for ClaimData {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn email_claim(value: &str, primary: bool) -> Claim {
        let attributes = if primary {
            vec![ClaimAttribute::Active, ClaimAttribute::Primary]
        } else {
            vec![ClaimAttribute::Active]
        };
        Claim::new(SectionKind::Communication, ClaimKind::Email, value.into(), None, None, attributes).unwrap()
    }

    #[test]
    fn claim_id_ignores_attributes() {
        let claim1 = Claim::new(SectionKind::Communication, ClaimKind::Email, "jerry@jerry.net".into(), None, None, vec![]).unwrap();
        let claim2 = Claim::new(
            SectionKind::Communication,
            ClaimKind::Email,
            "jerry@jerry.net".into(),
            None,
            None,
            vec![ClaimAttribute::Primary],
        )
        .unwrap();
        assert_eq!(claim1.id(), claim2.id());
        let claim3 = Claim::new(SectionKind::Communication, ClaimKind::Email, "larry@jerry.net".into(), None, None, vec![]).unwrap();
        assert!(claim1.id() != claim3.id());
    }

    #[test]
    fn claim_data_first_insert_forced_primary() {
        let data = ClaimData::new(NymID::random());
        // both inserted with primary=false. the first must come out primary
        // anyway; the second must not steal it.
        let first = email_claim("first@in.line", false);
        let second = email_claim("second@in.line", false);
        let data = data.add_item(first.clone()).add_item(second.clone());
        let group = data.group(SectionKind::Communication, ClaimKind::Email).unwrap();
        assert_eq!(group.claims().len(), 2);
        assert!(group.claim(first.id()).unwrap().is_primary());
        assert!(group.claim(first.id()).unwrap().is_active());
        assert!(!group.claim(second.id()).unwrap().is_primary());
    }

    #[test]
    fn claim_data_primary_insert_demotes() {
        let data = ClaimData::new(NymID::random());
        let first = email_claim("first@in.line", false);
        let second = email_claim("second@in.line", true);
        let data = data.add_item(first.clone()).add_item(second.clone());
        let group = data.group(SectionKind::Communication, ClaimKind::Email).unwrap();
        assert!(!group.claim(first.id()).unwrap().is_primary());
        assert!(group.claim(second.id()).unwrap().is_primary());
        let primaries = group.claims().iter().filter(|claim| claim.is_primary()).count();
        assert_eq!(primaries, 1);
    }

    #[test]
    fn claim_data_delete_drops_empty_group() {
        let data = ClaimData::new(NymID::random());
        let claim = email_claim("only@one.here", false);
        let data = data.add_item(claim.clone());
        assert!(data.group(SectionKind::Communication, ClaimKind::Email).is_some());
        let data = data.delete(claim.id());
        assert!(data.group(SectionKind::Communication, ClaimKind::Email).is_none());
        assert!(data.section(SectionKind::Communication).is_none());
    }

    #[test]
    fn claim_data_delete_no_reelection() {
        let data = ClaimData::new(NymID::random());
        let first = email_claim("first@in.line", false);
        let second = email_claim("second@in.line", false);
        let data = data.add_item(first.clone()).add_item(second.clone());
        let data = data.delete(first.id());
        let group = data.group(SectionKind::Communication, ClaimKind::Email).unwrap();
        assert_eq!(group.claims().len(), 1);
        assert!(group.primary().is_none());
        // best still answers deterministically
        assert_eq!(group.best().unwrap().id(), second.id());
    }

    #[test]
    fn claim_data_set_primary() {
        let data = ClaimData::new(NymID::random());
        let first = email_claim("first@in.line", false);
        let second = email_claim("second@in.line", false);
        let data = data.add_item(first.clone()).add_item(second.clone());
        let data = data.set_primary(second.id()).unwrap();
        let group = data.group(SectionKind::Communication, ClaimKind::Email).unwrap();
        assert!(!group.claim(first.id()).unwrap().is_primary());
        assert!(group.claim(second.id()).unwrap().is_primary());
        let res = data.set_primary(&ClaimID::random());
        assert_eq!(res.err(), Some(Error::ClaimNotFound));
    }

    #[test]
    fn claim_data_merge_primary_exclusivity() {
        let nym_id = NymID::random();
        let left = ClaimData::new(nym_id.clone()).add_item(email_claim("left@side.com", true));
        let right = ClaimData::new(nym_id.clone())
            .add_item(email_claim("right@side.com", true))
            .add_item(email_claim("extra@side.com", false));

        let merged = left.clone() + right.clone();
        let group = merged.group(SectionKind::Communication, ClaimKind::Email).unwrap();
        assert_eq!(group.claims().len(), 3);
        let primaries: Vec<_> = group.claims().iter().filter(|claim| claim.is_primary()).collect();
        assert_eq!(primaries.len(), 1);
        // left presented first: its primary wins
        assert_eq!(primaries[0].value(), "left@side.com");

        // merging the other way, right's primary wins
        let merged2 = right + left;
        let group2 = merged2.group(SectionKind::Communication, ClaimKind::Email).unwrap();
        let primaries2: Vec<_> = group2.claims().iter().filter(|claim| claim.is_primary()).collect();
        assert_eq!(primaries2.len(), 1);
        assert_eq!(primaries2[0].value(), "right@side.com");
    }

    #[test]
    fn claim_data_merge_version_max() {
        let nym_id = NymID::random();
        let left = ClaimData::new(nym_id.clone()).add_item(email_claim("a@b.c", false));
        assert_eq!(left.version(), &1);
        let social = Claim::new(
            SectionKind::Profile,
            ClaimKind::SocialProfile,
            "@nym".into(),
            None,
            None,
            vec![ClaimAttribute::Active],
        )
        .unwrap();
        let right = ClaimData::new(nym_id).add_item(social);
        assert_eq!(right.version(), &3);
        let merged = left + right;
        assert_eq!(merged.version(), &3);
    }

    #[test]
    fn claim_data_best_deterministic() {
        let data = ClaimData::new(NymID::random());
        let first = email_claim("first@in.line", false);
        let second = email_claim("second@in.line", false);
        let data = data.add_item(first.clone()).add_item(second);
        let best1 = data.best(SectionKind::Communication, ClaimKind::Email).unwrap().id().clone();
        let best2 = data.best(SectionKind::Communication, ClaimKind::Email).unwrap().id().clone();
        assert_eq!(best1, best2);
        assert_eq!(best1, *first.id());
        assert!(data.best(SectionKind::Contract, ClaimKind::PaymentCode).is_none());
    }

    #[test]
    fn claim_data_der_roundtrip() {
        let data = ClaimData::new(NymID::random())
            .add_item(email_claim("round@trip.io", true))
            .add_item(email_claim("second@trip.io", false));
        let ser = data.serialize_binary().unwrap();
        let data2 = ClaimData::deserialize_binary(&ser).unwrap();
        assert_eq!(data, data2);
    }
}

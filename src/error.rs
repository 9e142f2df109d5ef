//! The main error enum for the project lives here, and documents the various
//! conditions that can arise while interacting with the system.

use thiserror::Error;

/// This is our error enum. It contains an entry for any part of the system in
/// which an expectation is not met or a problem occurs.
#[derive(Error, Debug)]
pub enum Error {
    /// An error while decoding a DER-encoded object.
    #[error("ASN.1 deserialization error")]
    ASNDeserialize,

    /// An error while encoding an object as DER.
    #[error("ASN.1 serialization error")]
    ASNSerialize,

    /// A mutation was attempted on an authority whose master credential cannot
    /// sign child credentials.
    #[error("authority master cannot sign child credentials")]
    AuthorityCapabilityDenied,

    /// No authority with the given master id exists on this nym.
    #[error("authority not found")]
    AuthorityNotFound,

    /// A byte array was the wrong length for the thing it was building.
    #[error("bad byte length")]
    BadLength,

    /// Credential generation was attempted with every known algorithm and none
    /// of them are supported by the active provider.
    #[error("no supported key algorithm for credential generation")]
    CredentialNoSupportedAlgorithm,

    /// The credential store refused to save a credential during an ids-only
    /// serialization.
    #[error("credential store refused to save credential {0}")]
    CredentialStoreFailed(String),

    /// An authority was serialized in ids-only mode and the credential store
    /// cannot produce one of the referenced credentials.
    #[error("credential {0} missing from the credential store")]
    CredentialStoreMissing(String),

    /// The claim being operated on wasn't found.
    #[error("claim not found")]
    ClaimNotFound,

    /// Trying to mix keys/signatures/tags of different algorithms, e.g.
    /// verifying an ed25519 signature with a secp256k1 key.
    #[error("cryptographic algorithm mismatch")]
    CryptoAlgoMismatch,

    /// The requested algorithm is recognized but the active provider cannot
    /// generate keys for it.
    #[error("cryptographic algorithm not supported by this provider")]
    CryptoAlgoUnsupported,

    /// Bad salt given to a cryptographic function.
    #[error("incorrect salt given for kdf")]
    CryptoBadSalt,

    /// Bad seed given to a cryptographic function.
    #[error("incorrect seed given for keypair")]
    CryptoBadSeed,

    /// Key stretching via HKDF failed.
    #[error("HKDF key stretching failed")]
    CryptoHKDFFailed,

    /// Could not generate key from passphrase.
    #[error("key derivation from passphrase failed")]
    CryptoKDFFailed,

    /// A key is missing from a crypto operation (generally a private half that
    /// was stripped before the operation ran).
    #[error("crypto key missing")]
    CryptoKeyMissing,

    /// Failed to open a sealed object. This is a bummer, man.
    #[error("failed to open a sealed object")]
    CryptoOpenFailed,

    /// Failed to seal an object.
    #[error("failed to seal an object")]
    CryptoSealFailed,

    /// Failed to produce a signature.
    #[error("failed to create a signature")]
    CryptoSignatureFailed,

    /// A signature failed to verify.
    #[error("the given signature/public key/data combo does not verify")]
    CryptoSignatureVerificationFailed,

    /// An error while decoding base64.
    #[error("base64 deserialization error")]
    DeserializeBase64(#[from] base64::DecodeError),

    /// No keypair matches the requested role/algorithm.
    #[error("no keypair matches the requested role and algorithm")]
    KeypairNotFound,

    /// The nym id declared in a serialized nym does not match the id derived
    /// from its source.
    #[error("nym id does not match its source-derived id")]
    NymIDMismatch,

    /// The nym has no authority capable of signing child credentials, so claim
    /// mutations cannot be committed.
    #[error("nym is immutable (no capable authority)")]
    NymImmutable,

    /// The construction parameters contradict each other (for instance, a
    /// BIP-47 source with legacy credentials).
    #[error("construction parameters are incompatible: {0}")]
    ParamsIncompatible(&'static str),

    /// An error while engaging in yaml serialization.
    #[error("yaml serialization error")]
    SerializeYaml(#[from] serde_yaml::Error),

    /// We're trying to verify a signature on a value, but it's missing.
    #[error("signature missing on a value")]
    SignatureMissing,

    /// A public-key source was asked to produce an external signature, which
    /// only payment-code sources can do.
    #[error("this source type cannot produce external signatures")]
    SourceSignatureNotSupported,
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        // the variants that carry foreign error types are not Eq-able, so we
        // compare debug representations
        format!("{:?}", self) == format!("{:?}", other)
    }
}

/// Wraps `std::result::Result` around our `Error` enum
pub type Result<T> = std::result::Result<T, Error>;

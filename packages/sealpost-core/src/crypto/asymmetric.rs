//! # Identity Key Pairs
//!
//! RSA-OAEP key pairs used to wrap per-message session keys.
//!
//! ## Key Scoping
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KEY PAIR                                       │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌───────────────────────────┐      ┌───────────────────────────┐      │
//! │  │  PublicKey                │      │  PrivateKey               │      │
//! │  │                           │      │                           │      │
//! │  │  • wrap_key() only        │      │  • unwrap_key() only      │      │
//! │  │  • published via relay    │      │  • never leaves device    │      │
//! │  │  • JWK key_ops: encrypt   │      │  • JWK key_ops: decrypt   │      │
//! │  └───────────────────────────┘      └───────────────────────────┘      │
//! │                                                                         │
//! │  Parameters: RSA 2048-bit, e = 65537, OAEP(SHA-256, MGF1-SHA-256)      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Interchange Formats
//!
//! | Format | Public | Private | Used by |
//! |--------|--------|---------|---------|
//! | JWK (`RSA-OAEP-256`) | yes | yes | Default; publication format |
//! | PEM (SPKI / PKCS#8) | yes | yes | Accepted on import, optional export |
//!
//! Import auto-detects the format: text starting with `-----BEGIN` is PEM,
//! anything else is parsed as JWK.

use std::fmt;

use base64::{
    alphabet,
    engine::{general_purpose, DecodePaddingMode, GeneralPurpose},
    Engine as _,
};
use rand::rngs::OsRng;
use rsa::{
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding},
    traits::{PrivateKeyParts, PublicKeyParts},
    BigUint, Oaep, RsaPrivateKey, RsaPublicKey,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Error, Result};

/// RSA modulus length in bits
pub const MODULUS_BITS: usize = 2048;

/// Size of a wrapped session key in bytes (one RSA block)
pub const WRAPPED_KEY_SIZE: usize = MODULUS_BITS / 8;

/// JWK `alg` value for RSA-OAEP with SHA-256
pub const JWK_ALGORITHM: &str = "RSA-OAEP-256";

/// JWK `kty` value
const JWK_KEY_TYPE: &str = "RSA";

const PEM_PREFIX: &str = "-----BEGIN";

/// base64url for JWK integers: emits no padding, tolerates it on input
const JWK_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    general_purpose::NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A freshly generated identity key pair
pub struct KeyPair {
    public: PublicKey,
    private: PrivateKey,
}

impl KeyPair {
    /// Generate a new 2048-bit key pair from the OS random source
    ///
    /// Fails only if the entropy source fails.
    pub fn generate() -> Result<Self> {
        let secret = RsaPrivateKey::new(&mut OsRng, MODULUS_BITS)
            .map_err(|e| Error::KeyGenerationFailed(e.to_string()))?;
        let public = RsaPublicKey::from(&secret);

        Ok(Self {
            public: PublicKey(public),
            private: PrivateKey(secret),
        })
    }

    /// The public half (wrap only)
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// The private half (unwrap only)
    pub fn private(&self) -> &PrivateKey {
        &self.private
    }

    /// Split into its halves
    pub fn into_parts(self) -> (PublicKey, PrivateKey) {
        (self.public, self.private)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("private", &self.private)
            .finish()
    }
}

/// Public key scoped to wrapping session keys
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    /// Short hex fingerprint for out-of-band comparison
    ///
    /// SHA-256 over the big-endian modulus and exponent, first 16 bytes.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.n().to_bytes_be());
        hasher.update(self.0.e().to_bytes_be());
        let digest = hasher.finalize();
        hex::encode(&digest[..16])
    }
}

/// Private key scoped to unwrapping session keys
///
/// The underlying RSA key zeroizes itself on drop.
pub struct PrivateKey(RsaPrivateKey);

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

// ============================================================================
// JSON WEB KEY
// ============================================================================

/// RSA JSON Web Key as exported by WebCrypto
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct RsaJwk {
    kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ext: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_ops: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    e: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    p: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dq: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    qi: Option<String>,
}

impl RsaJwk {
    fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::MalformedKey(format!("invalid JWK: {}", e)))
    }

    /// Reject keys meant for another algorithm or operation
    fn check_algorithm(&self, required_op: &str) -> Result<()> {
        if self.kty != JWK_KEY_TYPE {
            return Err(Error::UnsupportedKey(format!(
                "key type `{}` (expected `{}`)",
                self.kty, JWK_KEY_TYPE
            )));
        }

        if let Some(alg) = &self.alg {
            if alg != JWK_ALGORITHM {
                return Err(Error::UnsupportedKey(format!(
                    "algorithm `{}` (expected `{}`)",
                    alg, JWK_ALGORITHM
                )));
            }
        }

        if let Some(ops) = &self.key_ops {
            if !ops.iter().any(|op| op == required_op) {
                return Err(Error::UnsupportedKey(format!(
                    "key_ops does not allow `{}`",
                    required_op
                )));
            }
        }

        Ok(())
    }
}

fn encode_component(value: &BigUint) -> String {
    JWK_BASE64.encode(value.to_bytes_be())
}

fn decode_component(name: &str, value: Option<&str>) -> Result<BigUint> {
    let value = value.ok_or_else(|| Error::MalformedKey(format!("JWK is missing `{}`", name)))?;
    let bytes = Zeroizing::new(
        JWK_BASE64
            .decode(value)
            .map_err(|e| Error::MalformedKey(format!("JWK `{}` is not base64url: {}", name, e)))?,
    );

    if bytes.is_empty() {
        return Err(Error::MalformedKey(format!("JWK `{}` is empty", name)));
    }

    Ok(BigUint::from_bytes_be(&bytes))
}

fn check_modulus(key: &RsaPublicKey) -> Result<()> {
    let bits = key.n().bits();
    if bits != MODULUS_BITS {
        return Err(Error::UnsupportedKey(format!(
            "modulus is {} bits (expected {})",
            bits, MODULUS_BITS
        )));
    }
    Ok(())
}

fn is_pem(text: &str) -> bool {
    text.trim_start().starts_with(PEM_PREFIX)
}

// ============================================================================
// EXPORT
// ============================================================================

/// Export a public key as JWK text (the publication format)
pub fn export_public_key(key: &PublicKey) -> Result<String> {
    let jwk = RsaJwk {
        kty: JWK_KEY_TYPE.to_string(),
        alg: Some(JWK_ALGORITHM.to_string()),
        ext: Some(true),
        key_ops: Some(vec!["encrypt".to_string()]),
        n: Some(encode_component(key.0.n())),
        e: Some(encode_component(key.0.e())),
        d: None,
        p: None,
        q: None,
        dp: None,
        dq: None,
        qi: None,
    };

    Ok(serde_json::to_string(&jwk)?)
}

/// Export a private key as JWK text
///
/// The returned text is zeroized when dropped. It must only ever be handed
/// to a [`KeyMaterialStore`](crate::storage::KeyMaterialStore).
pub fn export_private_key(key: &PrivateKey) -> Result<Zeroizing<String>> {
    let secret = &key.0;
    let primes = secret.primes();
    let (p, q) = match primes {
        [p, q] => (p, q),
        _ => {
            return Err(Error::UnsupportedKey(format!(
                "{} prime factors (expected 2)",
                primes.len()
            )))
        }
    };

    let missing = || Error::MalformedKey("private key lacks CRT parameters".into());
    let dp = secret.dp().ok_or_else(missing)?;
    let dq = secret.dq().ok_or_else(missing)?;
    let qi = secret.crt_coefficient().ok_or_else(missing)?;

    let jwk = RsaJwk {
        kty: JWK_KEY_TYPE.to_string(),
        alg: Some(JWK_ALGORITHM.to_string()),
        ext: Some(true),
        key_ops: Some(vec!["decrypt".to_string()]),
        n: Some(encode_component(secret.n())),
        e: Some(encode_component(secret.e())),
        d: Some(encode_component(secret.d())),
        p: Some(encode_component(p)),
        q: Some(encode_component(q)),
        dp: Some(encode_component(dp)),
        dq: Some(encode_component(dq)),
        qi: Some(encode_component(&qi)),
    };

    Ok(Zeroizing::new(serde_json::to_string(&jwk)?))
}

/// Export a public key as SPKI PEM
pub fn export_public_key_pem(key: &PublicKey) -> Result<String> {
    key.0
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| Error::SerializationError(format!("PEM encoding failed: {}", e)))
}

/// Export a private key as PKCS#8 PEM
pub fn export_private_key_pem(key: &PrivateKey) -> Result<Zeroizing<String>> {
    key.0
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| Error::SerializationError(format!("PEM encoding failed: {}", e)))
}

// ============================================================================
// IMPORT
// ============================================================================

/// Import a published public key (JWK or SPKI PEM)
///
/// ## Errors
///
/// - `MalformedKey`: not parseable, missing or invalid components
/// - `UnsupportedKey`: not RSA, not `RSA-OAEP-256`, not usable for
///   `encrypt`, or modulus is not 2048 bits
pub fn import_public_key(text: &str) -> Result<PublicKey> {
    let key = if is_pem(text) {
        RsaPublicKey::from_public_key_pem(text.trim())
            .map_err(|e| Error::MalformedKey(format!("invalid public key PEM: {}", e)))?
    } else {
        let jwk = RsaJwk::parse(text)?;
        jwk.check_algorithm("encrypt")?;

        let n = decode_component("n", jwk.n.as_deref())?;
        let e = decode_component("e", jwk.e.as_deref())?;

        RsaPublicKey::new(n, e)
            .map_err(|e| Error::MalformedKey(format!("invalid RSA public key: {}", e)))?
    };

    check_modulus(&key)?;
    Ok(PublicKey(key))
}

/// Import the local private key (JWK or PKCS#8 PEM)
///
/// The key is checked for internal consistency before it is returned.
pub fn import_private_key(text: &str) -> Result<PrivateKey> {
    let mut key = if is_pem(text) {
        RsaPrivateKey::from_pkcs8_pem(text.trim())
            .map_err(|e| Error::MalformedKey(format!("invalid private key PEM: {}", e)))?
    } else {
        let jwk = RsaJwk::parse(text)?;
        jwk.check_algorithm("decrypt")?;

        let n = decode_component("n", jwk.n.as_deref())?;
        let e = decode_component("e", jwk.e.as_deref())?;
        let d = decode_component("d", jwk.d.as_deref())?;
        let p = decode_component("p", jwk.p.as_deref())?;
        let q = decode_component("q", jwk.q.as_deref())?;
        // CRT values are recomputed from the primes; they only need to be present.
        for (name, value) in [("dp", &jwk.dp), ("dq", &jwk.dq), ("qi", &jwk.qi)] {
            decode_component(name, value.as_deref())?;
        }

        RsaPrivateKey::from_components(n, e, d, vec![p, q])
            .map_err(|e| Error::MalformedKey(format!("invalid RSA private key: {}", e)))?
    };

    check_modulus(&key.to_public_key())?;

    key.validate()
        .map_err(|e| Error::MalformedKey(format!("inconsistent RSA private key: {}", e)))?;
    key.precompute()
        .map_err(|e| Error::MalformedKey(format!("inconsistent RSA private key: {}", e)))?;

    Ok(PrivateKey(key))
}

// ============================================================================
// WRAP / UNWRAP
// ============================================================================

fn oaep() -> Oaep {
    Oaep::new::<Sha256>()
}

/// Encrypt raw session key bytes under a public key
///
/// Output is always [`WRAPPED_KEY_SIZE`] bytes; OAEP padding makes the
/// content different on every call.
pub fn wrap_key(session_key: &[u8], public_key: &PublicKey) -> Result<Vec<u8>> {
    public_key
        .0
        .encrypt(&mut OsRng, oaep(), session_key)
        .map_err(|e| Error::EncryptionFailed(format!("key wrap failed: {}", e)))
}

/// Recover raw session key bytes with the private key
///
/// Every failure maps to [`Error::Unwrap`], so the returned error does not
/// say whether the key was wrong or the wrapped key corrupted. Decryption is
/// blinded, but `rsa` 0.9 is not constant-time (RUSTSEC-2023-0071): timing
/// may still leak information to an attacker who can submit many wrapped
/// keys and measure how long each unwrap takes.
pub fn unwrap_key(wrapped: &[u8], private_key: &PrivateKey) -> Result<Zeroizing<Vec<u8>>> {
    private_key
        .0
        .decrypt_blinded(&mut OsRng, oaep(), wrapped)
        .map(Zeroizing::new)
        .map_err(|_| Error::Unwrap)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn shared_pair() -> &'static KeyPair {
        static PAIR: OnceLock<KeyPair> = OnceLock::new();
        PAIR.get_or_init(|| KeyPair::generate().unwrap())
    }

    fn jwk_value(text: &str) -> serde_json::Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_generated_key_parameters() {
        let pair = shared_pair();
        assert_eq!(pair.public().0.n().bits(), MODULUS_BITS);
        assert_eq!(pair.public().0.e(), &BigUint::from(65537u32));
    }

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let pair = shared_pair();
        let session_key = [7u8; 32];

        let wrapped = wrap_key(&session_key, pair.public()).unwrap();
        assert_eq!(wrapped.len(), WRAPPED_KEY_SIZE);

        let unwrapped = unwrap_key(&wrapped, pair.private()).unwrap();
        assert_eq!(&unwrapped[..], &session_key);
    }

    #[test]
    fn test_wrap_is_randomized() {
        let pair = shared_pair();
        let a = wrap_key(&[1u8; 32], pair.public()).unwrap();
        let b = wrap_key(&[1u8; 32], pair.public()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unwrap_with_wrong_key_fails() {
        let pair = shared_pair();
        let other = KeyPair::generate().unwrap();

        let wrapped = wrap_key(&[9u8; 32], pair.public()).unwrap();
        assert!(matches!(
            unwrap_key(&wrapped, other.private()),
            Err(Error::Unwrap)
        ));
    }

    #[test]
    fn test_unwrap_corrupted_fails_uniformly() {
        let pair = shared_pair();
        let mut wrapped = wrap_key(&[9u8; 32], pair.public()).unwrap();
        wrapped[10] ^= 0x01;

        let corrupted = unwrap_key(&wrapped, pair.private()).unwrap_err();
        let truncated = unwrap_key(&wrapped[..100], pair.private()).unwrap_err();

        assert!(matches!(corrupted, Error::Unwrap));
        assert!(matches!(truncated, Error::Unwrap));
        assert_eq!(corrupted.to_string(), truncated.to_string());
    }

    #[test]
    fn test_public_jwk_shape() {
        let text = export_public_key(shared_pair().public()).unwrap();
        let value = jwk_value(&text);

        assert_eq!(value["kty"], "RSA");
        assert_eq!(value["alg"], "RSA-OAEP-256");
        assert_eq!(value["e"], "AQAB");
        assert_eq!(value["key_ops"], serde_json::json!(["encrypt"]));
        assert!(value.get("d").is_none());
        assert!(!value["n"].as_str().unwrap().contains('='));
    }

    #[test]
    fn test_public_jwk_round_trip() {
        let pair = shared_pair();
        let text = export_public_key(pair.public()).unwrap();
        let imported = import_public_key(&text).unwrap();

        assert_eq!(&imported, pair.public());
        assert_eq!(imported.fingerprint(), pair.public().fingerprint());
    }

    #[test]
    fn test_private_jwk_round_trip_unwraps() {
        let pair = shared_pair();
        let text = export_private_key(pair.private()).unwrap();
        assert_eq!(jwk_value(&text)["key_ops"], serde_json::json!(["decrypt"]));

        let imported = import_private_key(&text).unwrap();
        let wrapped = wrap_key(&[3u8; 32], pair.public()).unwrap();
        assert_eq!(&unwrap_key(&wrapped, &imported).unwrap()[..], &[3u8; 32]);
    }

    #[test]
    fn test_pem_round_trip() {
        let pair = shared_pair();

        let public_pem = export_public_key_pem(pair.public()).unwrap();
        assert!(public_pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(&import_public_key(&public_pem).unwrap(), pair.public());

        let private_pem = export_private_key_pem(pair.private()).unwrap();
        let imported = import_private_key(&private_pem).unwrap();
        let wrapped = wrap_key(&[5u8; 32], pair.public()).unwrap();
        assert_eq!(&unwrap_key(&wrapped, &imported).unwrap()[..], &[5u8; 32]);
    }

    #[test]
    fn test_import_rejects_garbage() {
        for text in ["", "not json", "{}", "[1,2,3]", "-----BEGIN PUBLIC KEY-----\nAAAA\n"] {
            let result = import_public_key(text);
            assert!(
                matches!(result, Err(Error::MalformedKey(_)) | Err(Error::UnsupportedKey(_))),
                "accepted {:?}",
                text
            );
        }
    }

    #[test]
    fn test_import_missing_modulus_is_malformed() {
        let text = r#"{"kty":"RSA","alg":"RSA-OAEP-256","e":"AQAB"}"#;
        assert!(matches!(import_public_key(text), Err(Error::MalformedKey(_))));
    }

    #[test]
    fn test_import_bad_base64_is_malformed() {
        let text = r#"{"kty":"RSA","alg":"RSA-OAEP-256","n":"!!!","e":"AQAB"}"#;
        assert!(matches!(import_public_key(text), Err(Error::MalformedKey(_))));
    }

    #[test]
    fn test_import_wrong_algorithm_is_unsupported() {
        let mut value = jwk_value(&export_public_key(shared_pair().public()).unwrap());
        value["alg"] = serde_json::json!("RSA-OAEP");
        let result = import_public_key(&value.to_string());
        assert!(matches!(result, Err(Error::UnsupportedKey(_))));

        let mut value = jwk_value(&export_public_key(shared_pair().public()).unwrap());
        value["kty"] = serde_json::json!("EC");
        let result = import_public_key(&value.to_string());
        assert!(matches!(result, Err(Error::UnsupportedKey(_))));
    }

    #[test]
    fn test_import_short_modulus_is_unsupported() {
        let small = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let text = export_public_key(&PublicKey(small.to_public_key())).unwrap();

        assert!(matches!(import_public_key(&text), Err(Error::UnsupportedKey(_))));
    }

    #[test]
    fn test_private_jwk_is_not_a_public_key() {
        let text = export_private_key(shared_pair().private()).unwrap();
        assert!(matches!(import_public_key(&text), Err(Error::UnsupportedKey(_))));
    }

    #[test]
    fn test_public_jwk_is_not_a_private_key() {
        let text = export_public_key(shared_pair().public()).unwrap();
        assert!(matches!(
            import_private_key(&text),
            Err(Error::UnsupportedKey(_)) | Err(Error::MalformedKey(_))
        ));

        // Without key_ops the scope check cannot fire; the missing `d` must.
        let mut value = jwk_value(&text);
        value.as_object_mut().unwrap().remove("key_ops");
        assert!(matches!(
            import_private_key(&value.to_string()),
            Err(Error::MalformedKey(_))
        ));
    }

    #[test]
    fn test_tampered_private_jwk_is_malformed() {
        let text = export_private_key(shared_pair().private()).unwrap();
        let mut value = jwk_value(&text);
        value["d"] = serde_json::json!(JWK_BASE64.encode([1u8; 256]));

        assert!(matches!(
            import_private_key(&value.to_string()),
            Err(Error::MalformedKey(_))
        ));
    }

    #[test]
    fn test_fingerprints_differ_between_keys() {
        let other = KeyPair::generate().unwrap();
        assert_ne!(shared_pair().public().fingerprint(), other.public().fingerprint());
        assert_eq!(shared_pair().public().fingerprint().len(), 32);
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        assert_eq!(
            format!("{:?}", shared_pair().private()),
            "PrivateKey([REDACTED])"
        );
    }
}

//! HMAC-SHA256 request signing for browser extensions.
//!
//! An allow-listed extension signs a colon-joined payload with the shared
//! extension secret and sends the lowercase hex digest as `signature`:
//!
//! - submission: `extensionId:userId:boardId:title:imageUrl`
//! - status: `extensionId:userId` plus `:pinId` when a single pin is asked for

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Extension not authorized")]
    UnknownExtension,
    #[error("Invalid signature")]
    BadSignature,
    #[error("extension secret is not a usable HMAC key")]
    InvalidKey,
}

/// Allow-list plus the keyed MAC used to check extension requests.
#[derive(Clone)]
pub struct ExtensionAuth {
    allowed_ids: Arc<[String]>,
    key: HmacSha256,
}

impl ExtensionAuth {
    pub fn new(allowed_ids: Vec<String>, secret: &str) -> Result<Self, SignatureError> {
        let key =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self {
            allowed_ids: allowed_ids.into(),
            key,
        })
    }

    pub fn is_allowed(&self, extension_id: &str) -> bool {
        self.allowed_ids.iter().any(|id| id == extension_id)
    }

    /// Hex-encoded signature for `payload`.
    pub fn sign(&self, payload: &str) -> String {
        let mut mac = self.key.clone();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check the allow-list first, then the signature in constant time.
    pub fn verify(
        &self,
        extension_id: &str,
        payload: &str,
        signature: &str,
    ) -> Result<(), SignatureError> {
        if !self.is_allowed(extension_id) {
            return Err(SignatureError::UnknownExtension);
        }
        let signature = hex::decode(signature.trim()).map_err(|_| SignatureError::BadSignature)?;
        let mut mac = self.key.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SignatureError::BadSignature)
    }
}

impl core::fmt::Debug for ExtensionAuth {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExtensionAuth")
            .field("allowed_ids", &self.allowed_ids)
            .field("key", &"<redacted>")
            .finish()
    }
}

pub fn submission_payload(
    extension_id: &str,
    user_id: &str,
    board_id: &str,
    title: &str,
    image_url: &str,
) -> String {
    format!("{extension_id}:{user_id}:{board_id}:{title}:{image_url}")
}

pub fn status_payload(extension_id: &str, user_id: &str, pin_id: Option<&str>) -> String {
    match pin_id {
        Some(pin_id) => format!("{extension_id}:{user_id}:{pin_id}"),
        None => format!("{extension_id}:{user_id}"),
    }
}

/// Constant-time equality for shared secrets.
///
/// Both sides are MACed under `expected` so the final comparison runs over
/// equal-length tags regardless of what the caller sent.
pub fn secrets_match(expected: &str, presented: &str) -> bool {
    let Ok(key) = HmacSha256::new_from_slice(expected.as_bytes()) else {
        return false;
    };
    let mut presented_mac = key.clone();
    presented_mac.update(presented.as_bytes());
    let presented_tag = presented_mac.finalize().into_bytes();

    let mut expected_mac = key;
    expected_mac.update(expected.as_bytes());
    expected_mac.verify_slice(&presented_tag).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> ExtensionAuth {
        ExtensionAuth::new(vec!["ext-a".to_string()], "shared").unwrap()
    }

    #[test]
    fn signature_matches_hmac_sha256_hex() {
        // Reference value from RFC 4231 test case 2.
        let auth = ExtensionAuth::new(Vec::new(), "Jefe").unwrap();
        assert_eq!(
            auth.sign("what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn verification_checks_allow_list_then_signature() {
        let auth = auth();
        let payload = status_payload("ext-a", "u1", None);
        let signature = auth.sign(&payload);

        assert_eq!(auth.verify("ext-a", &payload, &signature), Ok(()));
        assert_eq!(
            auth.verify("ext-z", &payload, &signature),
            Err(SignatureError::UnknownExtension)
        );
        assert_eq!(
            auth.verify("ext-a", &status_payload("ext-a", "u2", None), &signature),
            Err(SignatureError::BadSignature)
        );
        assert_eq!(
            auth.verify("ext-a", &payload, "not-hex"),
            Err(SignatureError::BadSignature)
        );
        assert_eq!(
            auth.verify("ext-a", &payload, &signature[..10]),
            Err(SignatureError::BadSignature)
        );
    }

    #[test]
    fn payload_shapes() {
        assert_eq!(
            submission_payload("e", "u", "b", "t", "https://i"),
            "e:u:b:t:https://i"
        );
        assert_eq!(status_payload("e", "u", Some("p")), "e:u:p");
    }

    #[test]
    fn secret_comparison() {
        assert!(secrets_match("abc", "abc"));
        assert!(!secrets_match("abc", "abd"));
        assert!(!secrets_match("abc", "abcd"));
        assert!(!secrets_match("abc", ""));
    }

    #[test]
    fn debug_output_redacts_key() {
        assert!(!format!("{:?}", auth()).contains("shared"));
    }
}

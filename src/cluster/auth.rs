//! Per-node access tokens
//!
//! Every node gets its own ES256K JWT signed with the organization's
//! secp256k1 key: `iss` is the organization, `aud` the node.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::node::NodeDescriptor;
use super::AuthenticatedCluster;
use crate::error::{Error, Result};

/// Default token lifetime in seconds
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// Longest accepted token lifetime in seconds (one year)
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 3600;

const HEADER: &str = r#"{"alg":"ES256K","typ":"JWT"}"#;

/// Token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuing organization
    pub iss: String,
    /// Target node
    pub aud: String,
    #[serde(rename = "exp", with = "ts_seconds")]
    pub expire_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Issues node tokens from one signing key
pub struct Authenticator {
    key: SigningKey,
    ttl: Duration,
}

impl Authenticator {
    /// Load a hex-encoded secp256k1 private key
    pub fn from_hex(secret_key: &str, ttl: Duration) -> Result<Self> {
        let trimmed = secret_key.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        let bytes = Zeroizing::new(
            hex::decode(trimmed)
                .map_err(|e| Error::Config(format!("Secret key is not valid hex: {}", e)))?,
        );

        if bytes.len() != 32 {
            return Err(Error::Config(format!(
                "Secret key must be 32 bytes, got {}",
                bytes.len()
            )));
        }

        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| Error::Config("Secret key is not a valid secp256k1 scalar".to_string()))?;

        if ttl <= Duration::zero() {
            return Err(Error::InvalidConfig(
                "Token lifetime must be positive".to_string(),
            ));
        }
        if ttl.num_seconds() > MAX_TOKEN_TTL_SECS {
            return Err(Error::InvalidConfig(format!(
                "Token lifetime must be at most {} seconds",
                MAX_TOKEN_TTL_SECS
            )));
        }

        Ok(Authenticator { key, ttl })
    }

    /// Public half of the signing key
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key().clone()
    }

    /// Sign a token for one node
    pub fn issue_token(&self, node: &NodeDescriptor) -> Result<String> {
        let expire_at = Utc::now().checked_add_signed(self.ttl).ok_or_else(|| {
            Error::Config(format!("Token lifetime {} is out of range", self.ttl))
        })?;
        let claims = Claims {
            iss: node.org_id().to_string(),
            aud: node.node_id().to_string(),
            expire_at,
        };

        let payload = serde_json::to_vec(&claims)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );

        let signature: Signature = self.key.sign(signing_input.as_bytes());
        debug!("Issued token for node {}", node.node_id());

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }

    /// Issue tokens for every node, keeping their order
    pub fn authenticate(&self, nodes: Vec<NodeDescriptor>) -> Result<AuthenticatedCluster> {
        info!("Issuing access tokens for {} nodes", nodes.len());

        let nodes = nodes
            .into_iter()
            .map(|node| {
                let token = self.issue_token(&node)?;
                Ok(node.authenticate(token))
            })
            .collect::<Result<Vec<_>>>()?;

        AuthenticatedCluster::new(nodes)
    }

    /// Check a token's signature and expiry and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        verify_token(&self.verifying_key(), token)
    }
}

/// Check a token against a public key
pub fn verify_token(key: &VerifyingKey, token: &str) -> Result<Claims> {
    let mut parts = token.split('.');
    let segments = (parts.next(), parts.next(), parts.next(), parts.next());
    let (header, payload, encoded_signature) = match segments {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => return Err(Error::Token("expected three segments".to_string())),
    };

    let header_len = header.len();
    let header: Header = decode_segment(header)?;
    if header.alg != "ES256K" {
        return Err(Error::Token(format!("unsupported algorithm {}", header.alg)));
    }

    let signature_bytes = URL_SAFE_NO_PAD
        .decode(encoded_signature)
        .map_err(|e| Error::Token(format!("bad signature encoding: {}", e)))?;
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|_| Error::Token("malformed signature".to_string()))?;

    let signing_input = &token[..header_len + payload.len() + 1];
    key.verify(signing_input.as_bytes(), &signature)
        .map_err(|_| Error::Token("signature mismatch".to_string()))?;

    let claims: Claims = decode_segment(payload)?;
    if claims.expire_at <= Utc::now() {
        return Err(Error::Token("token expired".to_string()));
    }

    Ok(claims)
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| Error::Token(format!("bad segment encoding: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Token(format!("bad segment: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn authenticator() -> Authenticator {
        Authenticator::from_hex(KEY, Duration::seconds(DEFAULT_TOKEN_TTL_SECS)).unwrap()
    }

    fn node(id: &str) -> NodeDescriptor {
        NodeDescriptor::new(format!("http://{}", id), id, "did:nil:org")
    }

    #[test]
    fn test_token_verifies_with_claims() {
        let auth = authenticator();
        let token = auth.issue_token(&node("node-a")).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = auth.verify(&token).unwrap();
        assert_eq!(claims.iss, "did:nil:org");
        assert_eq!(claims.aud, "node-a");
        assert!(claims.expire_at > Utc::now());
    }

    #[test]
    fn test_tokens_differ_per_node() {
        let auth = authenticator();
        let a = auth.issue_token(&node("node-a")).unwrap();
        let b = auth.issue_token(&node("node-b")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_header_is_es256k() {
        let token = authenticator().issue_token(&node("node-a")).unwrap();
        let header = token.split('.').next().unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(header).unwrap();
        assert_eq!(decoded, HEADER.as_bytes());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let auth = authenticator();
        let token = auth.issue_token(&node("node-a")).unwrap();
        let forged_claims = URL_SAFE_NO_PAD.encode(
            r#"{"iss":"did:nil:org","aud":"node-b","exp":4102444800}"#,
        );

        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged_claims;
        let forged = parts.join(".");

        assert!(matches!(auth.verify(&forged), Err(Error::Token(_))));
    }

    #[test]
    fn test_other_key_rejects() {
        let token = authenticator().issue_token(&node("node-a")).unwrap();
        let other = Authenticator::from_hex(
            "0000000000000000000000000000000000000000000000000000000000000001",
            Duration::seconds(60),
        )
        .unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_bad_key_material() {
        let ttl = Duration::seconds(60);
        assert!(matches!(
            Authenticator::from_hex("not-hex", ttl),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Authenticator::from_hex("abcd", ttl),
            Err(Error::Config(_))
        ));
        // Zero is outside the scalar range
        assert!(matches!(
            Authenticator::from_hex(&"00".repeat(32), ttl),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_authenticate_keeps_order() {
        let cluster = authenticator()
            .authenticate(vec![node("node-b"), node("node-a")])
            .unwrap();
        assert_eq!(cluster.nodes()[0].descriptor().node_id(), "node-b");
        assert_eq!(cluster.nodes()[1].descriptor().node_id(), "node-a");
    }

    #[test]
    fn test_ttl_bounds() {
        assert!(matches!(
            Authenticator::from_hex(KEY, Duration::zero()),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Authenticator::from_hex(KEY, Duration::seconds(MAX_TOKEN_TTL_SECS + 1)),
            Err(Error::InvalidConfig(_))
        ));
        assert!(Authenticator::from_hex(KEY, Duration::seconds(MAX_TOKEN_TTL_SECS)).is_ok());
    }

    #[test]
    fn test_expiry_overflow_is_an_error() {
        let auth = Authenticator {
            key: authenticator().key,
            ttl: Duration::MAX,
        };
        assert!(matches!(
            auth.issue_token(&node("node-a")),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_prefixed_key_accepted() {
        let ttl = Duration::seconds(60);
        let a = Authenticator::from_hex(KEY, ttl).unwrap();
        let b = Authenticator::from_hex(&format!("0x{}", KEY), ttl).unwrap();
        assert_eq!(a.verifying_key(), b.verifying_key());
    }
}

//! Reconnect token issue/verify: `rt1.<base64url(payload)>.<base64url(sig)>`.
//!
//! Signing follows the HMAC-SHA-256 `base64url(json).base64url(hmac_sha256(json))` scheme used
//! throughout the ambient stack's realtime examples, extended with the `rt1` version prefix and
//! claim set the runtime needs (`{v, sid, lid, pid, iat, n}`).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::ids::{GameId, LobbyId, PlayerId, SessionId};

type HmacSha256 = Hmac<Sha256>;

const VERSION: u8 = 1;
const PREFIX: &str = "rt1";
const MIN_NONCE_BYTES: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconnectClaims {
    pub v: u8,
    pub sid: SessionId,
    pub lid: LobbyId,
    pub pid: PlayerId,
    pub iat: u64,
    pub n: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token issued in the future")]
    NotYetValid,
    #[error("claims did not match expected session/lobby/player")]
    ClaimMismatch,
}

pub struct TokenVerifyExpectations<'a> {
    pub session_id: &'a SessionId,
    pub lobby_id: &'a LobbyId,
    pub player_id: Option<&'a PlayerId>,
    pub now_ms: u64,
    pub max_age_ms: u64,
    pub allowed_clock_skew_ms: u64,
}

/// Signs and verifies reconnect tokens against a single shared secret.
pub struct TokenCodec {
    secret: Vec<u8>,
}

impl TokenCodec {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn issue(
        &self,
        session_id: &SessionId,
        lobby_id: &LobbyId,
        player_id: &PlayerId,
        now_ms: u64,
    ) -> String {
        let claims = ReconnectClaims {
            v: VERSION,
            sid: session_id.clone(),
            lid: lobby_id.clone(),
            pid: player_id.clone(),
            iat: now_ms,
            n: random_nonce(),
        };
        self.encode(&claims)
    }

    pub fn encode(&self, claims: &ReconnectClaims) -> String {
        let payload = serde_json::to_vec(claims).expect("claims always serialize");
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);
        let sig = self.sign(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(sig);
        format!("{PREFIX}.{payload_b64}.{sig_b64}")
    }

    pub fn verify(
        &self,
        token: &str,
        expect: &TokenVerifyExpectations<'_>,
    ) -> Result<ReconnectClaims, TokenError> {
        let mut parts = token.split('.');
        let prefix = parts.next().ok_or(TokenError::Malformed)?;
        let payload_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let sig_b64 = parts.next().ok_or(TokenError::Malformed)?;
        if parts.next().is_some() || prefix != PREFIX {
            return Err(TokenError::Malformed);
        }
        if !is_base64url_segment(payload_b64) || !is_base64url_segment(sig_b64) {
            return Err(TokenError::Malformed);
        }

        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts key material of any length");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&sig)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;
        let claims: ReconnectClaims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.v != VERSION {
            return Err(TokenError::Malformed);
        }
        if claims.iat > expect.now_ms + expect.allowed_clock_skew_ms {
            return Err(TokenError::NotYetValid);
        }
        if expect.now_ms > claims.iat + expect.max_age_ms {
            return Err(TokenError::Expired);
        }
        if &claims.sid != expect.session_id || &claims.lid != expect.lobby_id {
            return Err(TokenError::ClaimMismatch);
        }
        if let Some(expected_player) = expect.player_id {
            if &claims.pid != expected_player {
                return Err(TokenError::ClaimMismatch);
            }
        }

        Ok(claims)
    }

    fn sign(&self, payload_b64: &[u8]) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts key material of any length");
        mac.update(payload_b64);
        mac.finalize().into_bytes().into()
    }
}

fn is_base64url_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn random_nonce() -> String {
    let mut bytes = [0u8; MIN_NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (SessionId, LobbyId, PlayerId) {
        (
            SessionId::new("session_a").unwrap(),
            LobbyId::new("lobby_a").unwrap(),
            PlayerId::new("player_a").unwrap(),
        )
    }

    #[test]
    fn round_trips() {
        let codec = TokenCodec::new(b"secret".to_vec());
        let (sid, lid, pid) = ids();
        let token = codec.issue(&sid, &lid, &pid, 1_000);
        let claims = codec
            .verify(
                &token,
                &TokenVerifyExpectations {
                    session_id: &sid,
                    lobby_id: &lid,
                    player_id: Some(&pid),
                    now_ms: 1_000,
                    max_age_ms: 60_000,
                    allowed_clock_skew_ms: 1_000,
                },
            )
            .unwrap();
        assert_eq!(claims.sid, sid);
    }

    #[test]
    fn flipped_signature_bit_rejected() {
        let codec = TokenCodec::new(b"secret".to_vec());
        let (sid, lid, pid) = ids();
        let token = codec.issue(&sid, &lid, &pid, 1_000);
        let mut parts: Vec<&str> = token.split('.').collect();
        let mut sig_bytes = URL_SAFE_NO_PAD.decode(parts[2]).unwrap();
        sig_bytes[0] ^= 0x01;
        let tampered_sig = URL_SAFE_NO_PAD.encode(sig_bytes);
        parts[2] = &tampered_sig;
        let tampered = parts.join(".");

        let err = codec
            .verify(
                &tampered,
                &TokenVerifyExpectations {
                    session_id: &sid,
                    lobby_id: &lid,
                    player_id: Some(&pid),
                    now_ms: 1_000,
                    max_age_ms: 60_000,
                    allowed_clock_skew_ms: 1_000,
                },
            )
            .unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
    }

    #[test]
    fn expired_token_rejected() {
        let codec = TokenCodec::new(b"secret".to_vec());
        let (sid, lid, pid) = ids();
        let token = codec.issue(&sid, &lid, &pid, 0);

        let ok = codec.verify(
            &token,
            &TokenVerifyExpectations {
                session_id: &sid,
                lobby_id: &lid,
                player_id: Some(&pid),
                now_ms: 59_999,
                max_age_ms: 60_000,
                allowed_clock_skew_ms: 0,
            },
        );
        assert!(ok.is_ok());

        let err = codec
            .verify(
                &token,
                &TokenVerifyExpectations {
                    session_id: &sid,
                    lobby_id: &lid,
                    player_id: Some(&pid),
                    now_ms: 60_001,
                    max_age_ms: 60_000,
                    allowed_clock_skew_ms: 0,
                },
            )
            .unwrap_err();
        assert_eq!(err, TokenError::Expired);
    }

    #[test]
    fn claim_mismatch_rejected() {
        let codec = TokenCodec::new(b"secret".to_vec());
        let (sid, lid, pid) = ids();
        let token = codec.issue(&sid, &lid, &pid, 1_000);
        let other_lobby = LobbyId::new("lobby_b").unwrap();

        let err = codec
            .verify(
                &token,
                &TokenVerifyExpectations {
                    session_id: &sid,
                    lobby_id: &other_lobby,
                    player_id: Some(&pid),
                    now_ms: 1_000,
                    max_age_ms: 60_000,
                    allowed_clock_skew_ms: 1_000,
                },
            )
            .unwrap_err();
        assert_eq!(err, TokenError::ClaimMismatch);
    }
}

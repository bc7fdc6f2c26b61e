//! # rf-auth-simple
//!
//! HMAC-based implementation of `AuthProvider`.
//!
//! Tokens have the shape `<user uuid>.<role>.<hex signature>` where role is
//! `user` or `admin` and the signature is HMAC-SHA256 over `<uuid>.<role>`
//! keyed with the server secret. Anything that fails to parse or verify
//! resolves to an anonymous viewer.

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use rf_core::models::Viewer;
use rf_core::traits::AuthProvider;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const ROLE_USER: &str = "user";
const ROLE_ADMIN: &str = "admin";

pub struct SimpleAuthProvider {
    /// Keyed once, cloned per token.
    keyed: HmacSha256,
}

impl SimpleAuthProvider {
    /// Accepts the signing secret (e.g., from an environment variable)
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, InvalidLength> {
        let keyed = HmacSha256::new_from_slice(secret.as_ref())?;
        Ok(Self { keyed })
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(payload.as_bytes());
        mac
    }

    fn verify(&self, token: &str) -> Option<Viewer> {
        let (payload, signature) = token.rsplit_once('.')?;
        let (id, role) = payload.split_once('.')?;

        let signature = hex::decode(signature).ok()?;
        self.mac(payload).verify_slice(&signature).ok()?;

        let id = Uuid::parse_str(id).ok()?;
        match role {
            ROLE_USER => Some(Viewer::user(id)),
            ROLE_ADMIN => Some(Viewer::admin(id)),
            _ => None,
        }
    }
}

impl AuthProvider for SimpleAuthProvider {
    fn authenticate(&self, token: Option<&str>) -> Viewer {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Viewer::Anonymous;
        };

        match self.verify(token) {
            Some(viewer) => viewer,
            None => {
                log::debug!("Rejected bearer token, treating request as anonymous");
                Viewer::Anonymous
            }
        }
    }

    fn issue_token(&self, user_id: Uuid, is_admin: bool) -> String {
        let role = if is_admin { ROLE_ADMIN } else { ROLE_USER };
        let payload = format!("{}.{}", user_id, role);
        let signature = hex::encode(self.mac(&payload).finalize().into_bytes());
        format!("{}.{}", payload, signature)
    }
}

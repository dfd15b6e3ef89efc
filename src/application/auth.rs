//! Operator authentication and session tokens.

use std::sync::Arc;

use metrics::counter;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use crate::domain::accounts::{Operator, OperatorAccount};

/// Cookie carrying the signed session token.
pub const SESSION_COOKIE: &str = "geeoh_session";

pub(crate) const METRIC_LOGIN_FAILURES: &str = "geeoh_login_failures_total";

/// Keyed digest stored for each operator account, hex encoded.
pub fn hash_password(secret_key: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret_key.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// `{account_id}:{expires_at_unix}`; integrity comes from the cookie signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionToken {
    pub account_id: u32,
    pub expires_at: OffsetDateTime,
}

impl SessionToken {
    pub fn encode(&self) -> String {
        format!("{}:{}", self.account_id, self.expires_at.unix_timestamp())
    }

    pub fn parse(value: &str) -> Option<Self> {
        let (account, expires) = value.split_once(':')?;
        let account_id = account.parse().ok()?;
        let expires_at = OffsetDateTime::from_unix_timestamp(expires.parse().ok()?).ok()?;
        Some(Self {
            account_id,
            expires_at,
        })
    }
}

#[derive(Clone)]
pub struct AuthService {
    secret_key: Arc<str>,
    accounts: Arc<[OperatorAccount]>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(secret_key: &str, accounts: Vec<OperatorAccount>, session_ttl: Duration) -> Self {
        Self {
            secret_key: Arc::from(secret_key),
            accounts: Arc::from(accounts),
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Option<Operator> {
        let digest = hash_password(&self.secret_key, password);
        let account = self
            .accounts
            .iter()
            .find(|account| account.username == username);

        let matched = account.filter(|account| {
            let stored = account.password_hash.trim().to_ascii_lowercase();
            stored.as_bytes().ct_eq(digest.as_bytes()).unwrap_u8() == 1
        });

        match matched {
            Some(account) => {
                info!(
                    target = "geeoh::application::auth",
                    username = %account.username,
                    "operator signed in"
                );
                Some(Operator::from(account))
            }
            None => {
                counter!(METRIC_LOGIN_FAILURES).increment(1);
                warn!(
                    target = "geeoh::application::auth",
                    username = %username,
                    "rejected sign-in attempt"
                );
                None
            }
        }
    }

    pub fn issue_session(&self, operator: &Operator, now: OffsetDateTime) -> SessionToken {
        SessionToken {
            account_id: operator.id,
            expires_at: now + self.session_ttl,
        }
    }

    /// Operator behind `token`, unless it is malformed, expired, or names an
    /// account that is no longer configured.
    pub fn verify_session(&self, token: &str, now: OffsetDateTime) -> Option<Operator> {
        let token = SessionToken::parse(token)?;
        if token.expires_at <= now {
            return None;
        }

        self.accounts
            .iter()
            .find(|account| account.id == token.account_id)
            .map(Operator::from)
    }
}

/// Accept only same-site absolute paths as post-login redirect targets.
pub fn local_redirect_target(next: &str) -> Option<&str> {
    let is_local = next.starts_with('/')
        && !next.starts_with("//")
        && !next.contains('\\')
        && !next.chars().any(char::is_control);
    is_local.then_some(next)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn service() -> AuthService {
        AuthService::new(
            SECRET,
            vec![OperatorAccount {
                id: 7,
                username: "geeoh".into(),
                password_hash: hash_password(SECRET, "hunter2"),
            }],
            Duration::days(1),
        )
    }

    #[test]
    fn digest_is_keyed_by_the_secret() {
        let first = hash_password(SECRET, "hunter2");
        assert_eq!(first.len(), 64);
        assert_eq!(first, hash_password(SECRET, "hunter2"));
        assert_ne!(first, hash_password("another-secret", "hunter2"));
    }

    #[test]
    fn authenticate_accepts_matching_credentials() {
        let operator = service().authenticate("geeoh", "hunter2").expect("operator");
        assert_eq!(operator.id, 7);
        assert_eq!(operator.username, "geeoh");
    }

    #[test]
    fn authenticate_rejects_bad_credentials() {
        let auth = service();
        assert!(auth.authenticate("geeoh", "wrong").is_none());
        assert!(auth.authenticate("nobody", "hunter2").is_none());
    }

    #[test]
    fn sessions_expire() {
        let auth = service();
        let now = datetime!(2024-03-09 12:00 UTC);
        let operator = auth.authenticate("geeoh", "hunter2").expect("operator");
        let token = auth.issue_session(&operator, now).encode();

        assert_eq!(auth.verify_session(&token, now), Some(operator));
        assert!(
            auth.verify_session(&token, now + Duration::days(1))
                .is_none()
        );
    }

    #[test]
    fn sessions_for_unknown_accounts_are_rejected() {
        let auth = service();
        let now = datetime!(2024-03-09 12:00 UTC);
        let token = SessionToken {
            account_id: 99,
            expires_at: now + Duration::hours(1),
        };
        assert!(auth.verify_session(&token.encode(), now).is_none());
        assert!(auth.verify_session("garbage", now).is_none());
        assert!(auth.verify_session("7:notanumber", now).is_none());
    }

    #[test]
    fn only_local_paths_are_redirect_targets() {
        assert_eq!(local_redirect_target("/publish/"), Some("/publish/"));
        assert_eq!(local_redirect_target("//evil.example"), None);
        assert_eq!(local_redirect_target("https://evil.example"), None);
        assert_eq!(local_redirect_target("/\\evil"), None);
    }
}

//! Certification token cache.
//!
//! Holds the bearer token issued by the certification service and renews it
//! shortly before it expires. Renewal is single-flight: the first caller that
//! finds the token stale authenticates, every concurrent caller waits for that
//! result on a watch channel. The slot lock is never held across the request.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::{CertificationApi, TransportError};
use crate::config::CertificationConfig;
use crate::domain::dates::parse_timestamp;
use crate::error::AppError;
use crate::service::clock::Clock;

/// A token and the instant it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    /// Bearer value.
    pub value: String,
    /// Expiration instant.
    pub expires_at: DateTime<Utc>,
}

/// Why no token could be obtained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenFailure {
    /// The service answered but refused the credentials.
    #[error("authentication rejected (code {code:?}): {message}")]
    Rejected {
        /// Upstream result code.
        code: Option<i64>,
        /// Upstream message.
        message: String,
    },
    /// The request did not complete.
    #[error(transparent)]
    Transport(TransportError),
}

impl From<TokenFailure> for AppError {
    fn from(failure: TokenFailure) -> Self {
        match failure {
            TokenFailure::Rejected { message, .. } => Self::AuthenticationRejected(message),
            TokenFailure::Transport(err) if err.is_auth_rejection() => {
                Self::AuthenticationRejected(err.to_string())
            }
            TokenFailure::Transport(err) => err.into(),
        }
    }
}

type Flight = watch::Receiver<Option<Result<CachedToken, TokenFailure>>>;

#[derive(Debug, Default)]
struct Slot {
    token: Option<CachedToken>,
    inflight: Option<Flight>,
}

/// Clears the in-flight marker even if the leader is cancelled mid-request.
struct FlightReset<'a>(&'a Mutex<Slot>);

impl Drop for FlightReset<'_> {
    fn drop(&mut self) {
        self.0.lock().inflight = None;
    }
}

enum Role {
    Leader(watch::Sender<Option<Result<CachedToken, TokenFailure>>>),
    Follower(Flight),
}

fn to_delta(duration: std::time::Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// Single-flight token cache.
#[derive(Debug)]
pub struct AuthTokenCache {
    api: Arc<dyn CertificationApi>,
    clock: Arc<dyn Clock>,
    margin: TimeDelta,
    fallback_ttl: TimeDelta,
    slot: Mutex<Slot>,
}

impl AuthTokenCache {
    /// Create an empty cache.
    pub fn new(
        api: Arc<dyn CertificationApi>,
        clock: Arc<dyn Clock>,
        config: &CertificationConfig,
    ) -> Self {
        Self {
            api,
            clock,
            margin: to_delta(config.refresh_margin()),
            fallback_ttl: to_delta(config.fallback_ttl()),
            slot: Mutex::new(Slot::default()),
        }
    }

    fn is_fresh(&self, token: &CachedToken) -> bool {
        token.expires_at - self.clock.now() > self.margin
    }

    /// A token valid for at least the refresh margin.
    ///
    /// # Errors
    ///
    /// Returns the authentication failure; nothing is cached in that case.
    pub async fn get_token(&self) -> Result<String, TokenFailure> {
        let role = {
            let mut slot = self.slot.lock();
            if let Some(token) = slot.token.as_ref().filter(|token| self.is_fresh(token)) {
                return Ok(token.value.clone());
            }
            if let Some(flight) = &slot.inflight {
                Role::Follower(flight.clone())
            } else {
                let (sender, receiver) = watch::channel(None);
                slot.inflight = Some(receiver);
                Role::Leader(sender)
            }
        };

        match role {
            Role::Leader(sender) => {
                let _reset = FlightReset(&self.slot);
                let result = self.fetch().await;
                if let Ok(token) = &result {
                    self.slot.lock().token = Some(token.clone());
                }
                sender.send_replace(Some(result.clone()));
                result.map(|token| token.value)
            }
            Role::Follower(mut receiver) => {
                debug!("Waiting for in-flight token refresh");
                let outcome = receiver.wait_for(Option::is_some).await.map_err(|_| {
                    TokenFailure::Transport(TransportError::Other(
                        "token refresh was abandoned".to_string(),
                    ))
                })?;
                match outcome.as_ref() {
                    Some(result) => result.clone().map(|token| token.value),
                    None => Err(TokenFailure::Transport(TransportError::Other(
                        "token refresh produced no result".to_string(),
                    ))),
                }
            }
        }
    }

    async fn fetch(&self) -> Result<CachedToken, TokenFailure> {
        let reply = match self.api.authenticate().await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "Certification authentication failed");
                metrics::counter!("ecf_token_refreshes_total", "outcome" => "error").increment(1);
                return Err(TokenFailure::Transport(err));
            }
        };

        let token = reply
            .token
            .clone()
            .filter(|_| reply.is_success());
        let Some(value) = token else {
            let message = reply
                .mensaje
                .unwrap_or_else(|| "authentication failed".to_string());
            warn!(code = ?reply.codigo, message = %message, "Certification service refused credentials");
            metrics::counter!("ecf_token_refreshes_total", "outcome" => "rejected").increment(1);
            return Err(TokenFailure::Rejected {
                code: reply.codigo,
                message,
            });
        };

        let now = self.clock.now();
        let expires_at = reply
            .fecha_expiracion
            .as_deref()
            .and_then(parse_timestamp)
            .filter(|at| *at > now)
            .unwrap_or_else(|| now + self.fallback_ttl);

        metrics::counter!("ecf_token_refreshes_total", "outcome" => "ok").increment(1);
        info!(expires_at = %expires_at, "Certification token refreshed");
        Ok(CachedToken { value, expires_at })
    }

    /// Drop the cached token; the next caller authenticates again.
    pub fn invalidate(&self) {
        if self.slot.lock().token.take().is_some() {
            info!("Certification token invalidated");
        }
    }

    /// Expiration of the cached token, if any.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.slot.lock().token.as_ref().map(|token| token.expires_at)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::client::fake::FakeApi;
    use crate::service::clock::ManualClock;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    fn cache_with(api: Arc<FakeApi>) -> (Arc<AuthTokenCache>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now()));
        let cache = AuthTokenCache::new(api, clock.clone(), &CertificationConfig::default());
        (Arc::new(cache), clock)
    }

    fn expiring_at(token: &str, at: &str) -> crate::client::AuthReply {
        serde_json::from_value(json!({
            "codigo": 0,
            "token": token,
            "fechaExpiracion": at
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_request() {
        let api = Arc::new(FakeApi::default());
        *api.auth_delay.lock() = Duration::from_millis(50);
        let (cache, _) = cache_with(api.clone());

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_token().await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "tok-1");
        }

        assert_eq!(api.auth_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_renewed_inside_margin() {
        let api = Arc::new(FakeApi::default());
        *api.auth.lock() = Ok(expiring_at("first", "2026-06-15T13:00:00Z"));
        let (cache, clock) = cache_with(api.clone());

        assert_eq!(cache.get_token().await.unwrap(), "first");
        clock.advance(TimeDelta::minutes(50));
        assert_eq!(cache.get_token().await.unwrap(), "first");
        assert_eq!(api.auth_calls.load(Ordering::SeqCst), 1);

        // Four minutes left is inside the five minute margin.
        *api.auth.lock() = Ok(expiring_at("second", "2026-06-15T15:00:00Z"));
        clock.advance(TimeDelta::minutes(6));
        assert_eq!(cache.get_token().await.unwrap(), "second");
        assert_eq!(api.auth_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_expiration_uses_fallback_ttl() {
        let api = Arc::new(FakeApi::default());
        *api.auth.lock() = Ok(serde_json::from_value(json!({"codigo": 0, "token": "t"})).unwrap());
        let (cache, _) = cache_with(api);

        cache.get_token().await.unwrap();
        assert_eq!(cache.expires_at(), Some(now() + TimeDelta::hours(1)));
    }

    #[tokio::test]
    async fn test_rejection_is_not_cached() {
        let api = Arc::new(FakeApi::default());
        *api.auth.lock() = Ok(serde_json::from_value(json!({
            "codigo": 401,
            "mensaje": "Usuario o clave incorrecta"
        }))
        .unwrap());
        let (cache, _) = cache_with(api.clone());

        let failure = cache.get_token().await.unwrap_err();
        assert_eq!(
            failure,
            TokenFailure::Rejected {
                code: Some(401),
                message: "Usuario o clave incorrecta".to_string()
            }
        );
        assert!(cache.expires_at().is_none());

        *api.auth.lock() = Ok(crate::client::fake::auth_ok("tok-2"));
        assert_eq!(cache.get_token().await.unwrap(), "tok-2");
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_request() {
        let api = Arc::new(FakeApi::default());
        let (cache, _) = cache_with(api.clone());

        cache.get_token().await.unwrap();
        cache.invalidate();
        cache.get_token().await.unwrap();
        assert_eq!(api.auth_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_maps_to_unavailable() {
        let api = Arc::new(FakeApi::default());
        *api.auth.lock() = Err(TransportError::Refused("connection refused".to_string()));
        let (cache, _) = cache_with(api);

        let err: AppError = cache.get_token().await.unwrap_err().into();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }
}

use axum::http::HeaderMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::core::config::RateLimitConfig;

struct ClientLimiter {
    limiter: DefaultDirectRateLimiter,
    last_seen: Instant,
}

/// Token-bucket gate keyed by client network address.
///
/// All map access happens under one mutex that is never held across an await.
pub struct AdmissionController {
    clients: Mutex<HashMap<String, ClientLimiter>>,
    quota: Quota,
    idle_timeout: Duration,
    sweep_interval: Duration,
    trust_proxy_headers: bool,
}

impl AdmissionController {
    pub fn new(config: &RateLimitConfig) -> Self {
        let per_second = NonZeroU32::new(config.per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);

        Self {
            clients: Mutex::new(HashMap::new()),
            quota: Quota::per_second(per_second).allow_burst(burst),
            idle_timeout: config.idle_timeout,
            sweep_interval: config.sweep_interval,
            trust_proxy_headers: config.trust_proxy_headers,
        }
    }

    /// Derive the bucket key for a request: the peer IP, or the first proxy
    /// header value when proxy headers are trusted.
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        if self.trust_proxy_headers {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            let real_ip = headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty());

            if let Some(ip) = forwarded.or(real_ip) {
                return ip.to_string();
            }
        }

        peer.map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Take one token for `client_key`; `false` means the request must be rejected
    pub fn check(&self, client_key: &str) -> bool {
        let now = Instant::now();
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let entry = clients
            .entry(client_key.to_string())
            .or_insert_with(|| ClientLimiter {
                limiter: RateLimiter::direct(self.quota),
                last_seen: now,
            });
        entry.last_seen = now;
        entry.limiter.check().is_ok()
    }

    /// Drop clients idle for longer than the inactivity window. Returns how many were evicted.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    fn evict_idle_at(&self, now: Instant) -> usize {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let before = clients.len();
        clients.retain(|_, c| now.saturating_duration_since(c.last_seen) <= self.idle_timeout);
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Run the eviction sweep until `shutdown` flips to true
    pub fn spawn_sweeper(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.sweep_interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = self.evict_idle();
                        if evicted > 0 {
                            tracing::debug!(
                                "Evicted {} idle rate-limit clients, {} remain",
                                evicted,
                                self.tracked_clients()
                            );
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Rate-limit sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

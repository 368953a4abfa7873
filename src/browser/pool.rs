//! Lease protocol over `BrowserBinding` (spec.md §4.2).
//!
//! `lease()` tries to reconnect to an idle session before paying the cost of
//! launching a new one, grounded in the same reuse-over-relaunch preference
//! as the teacher's pre-warmed pool, just without its background scaler —
//! this pool is fail-fast rather than queueing.

use super::binding::{BindingError, SharedBinding};
use super::harden::{PageHarden, RequestRouter, ResourcePolicy};
use super::session::Session;
use crate::clock::IdSource;
use crate::error::{GatewayError, GatewayResult};
use chromiumoxide::Page;
use std::time::Duration;

pub struct SessionPool {
    binding: SharedBinding,
    keep_alive: Duration,
}

/// Held for the lifetime of a single operation. Dropping it closes the page
/// and then releases the session back to the fleet.
pub struct Lease {
    binding: SharedBinding,
    session: Option<Session>,
    page: Option<Page>,
    _router: Option<RequestRouter>,
}

impl Lease {
    pub fn page(&self) -> &Page {
        self.page.as_ref().expect("page present for lease lifetime")
    }

    /// Explicit async release. Dropping the lease without calling this still
    /// closes the page/session, just via best-effort fire-and-forget tasks.
    pub async fn release(mut self) {
        let page = self.page.take();
        let session = self.session.take();
        let binding = self.binding.clone();

        if let Some(page) = &page {
            if let Err(e) = binding.close_page(page).await {
                tracing::debug!(error = %e, "close_page failed during release");
            }
        }
        if let Some(session) = &session {
            if let Err(e) = binding.close_session(session).await {
                tracing::debug!(error = %e, "close_session failed during release");
            }
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let page = self.page.take();
        let session = self.session.take();
        let binding = self.binding.clone();
        if page.is_none() && session.is_none() {
            return;
        }
        tokio::spawn(async move {
            if let Some(page) = page {
                if let Err(e) = binding.close_page(&page).await {
                    tracing::debug!(error = %e, "close_page failed on drop");
                }
            }
            if let Some(session) = session {
                if let Err(e) = binding.close_session(&session).await {
                    tracing::debug!(error = %e, "close_session failed on drop");
                }
            }
        });
    }
}

impl SessionPool {
    pub fn new(binding: SharedBinding, keep_alive: Duration) -> Self {
        Self { binding, keep_alive }
    }

    /// 1. List sessions, try to connect to a random idle one (skip it on
    ///    failure rather than retrying it). 2. If none connected, check
    ///    quota and launch, or fail with `SessionsExhausted`. 3. Open a
    ///    page. 4. Harden it per `resource_policy`.
    pub async fn lease(
        &self,
        ids: &dyn IdSource,
        resource_policy: ResourcePolicy,
    ) -> GatewayResult<Lease> {
        let session = self.acquire_session(ids).await?;

        let page = match self.binding.new_page(&session).await {
            Ok(page) => page,
            Err(e) => {
                let _ = self.binding.close_session(&session).await;
                return Err(GatewayError::UpstreamTransient(e.to_string()));
            }
        };

        let router = match PageHarden::apply(&page, ids, resource_policy).await {
            Ok(router) => router,
            Err(e) => {
                let _ = self.binding.close_page(&page).await;
                let _ = self.binding.close_session(&session).await;
                return Err(GatewayError::UpstreamTransient(e.to_string()));
            }
        };

        Ok(Lease {
            binding: self.binding.clone(),
            session: Some(session),
            page: Some(page),
            _router: router,
        })
    }

    async fn acquire_session(&self, ids: &dyn IdSource) -> GatewayResult<Session> {
        let idle: Vec<String> = self
            .binding
            .list_sessions()
            .await
            .map_err(|e| GatewayError::UpstreamTransient(e.to_string()))?
            .into_iter()
            .filter(|s| !s.has_connection)
            .map(|s| s.session_id)
            .collect();

        if !idle.is_empty() {
            let pick = &idle[ids.next_index(idle.len())];
            match self.binding.connect(pick).await {
                Ok(session) => return Ok(session),
                Err(BindingError::SessionGone(_)) => {
                    tracing::debug!(session_id = %pick, "idle session vanished before connect, falling through to launch");
                }
                Err(e) => return Err(GatewayError::UpstreamTransient(e.to_string())),
            }
        }

        match self.binding.launch(self.keep_alive).await {
            Ok(session) => Ok(session),
            Err(BindingError::QuotaExceeded { wait_until }) => {
                Err(GatewayError::SessionsExhausted {
                    reason: "browser fleet at capacity".to_string(),
                    retry_after: wait_until.saturating_duration_since(std::time::Instant::now()),
                })
            }
            Err(e) => Err(GatewayError::UpstreamTransient(e.to_string())),
        }
    }
}

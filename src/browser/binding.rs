//! Thin adapter over the remote browser-automation fleet (spec.md §4.1).
//!
//! `close(session)` releases our hold on a session (`has_connection` flips
//! back to `false`) without tearing down the remote browser — the fleet's
//! own keep-alive timer is what eventually kills an idle session. This is
//! what makes session reuse in `SessionPool::lease` possible: a session
//! closed by one caller can be `connect`-ed to by the next.
//!
//! The real weblinq deployment talks to an external fleet operator over its
//! own control-plane API; that operator is not available here; so
//! `ChromiumoxideBinding` backs `list_sessions`/`quota` with an in-memory
//! session directory that mimics the same contract, while `launch` and
//! `connect` drive a real local `chromiumoxide::Browser`. Swapping in a real
//! fleet client means replacing this one file — `SessionPool` and everything
//! above it only ever sees the trait.

use super::profile::create_unique_profile_with_prefix;
use super::session::{PoolQuota, Session, SessionDescriptor};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::Page;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use uuid::Uuid;

const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("transient browser-fleet error: {0}")]
    Transient(String),
    #[error("session gone: {0}")]
    SessionGone(String),
    #[error("quota exceeded, retry after {wait_until:?}")]
    QuotaExceeded { wait_until: Instant },
}

#[async_trait]
pub trait BrowserBinding: Send + Sync {
    async fn launch(&self, keep_alive: Duration) -> Result<Session, BindingError>;
    async fn connect(&self, session_id: &str) -> Result<Session, BindingError>;
    async fn list_sessions(&self) -> Result<Vec<SessionDescriptor>, BindingError>;
    async fn quota(&self) -> Result<PoolQuota, BindingError>;
    async fn new_page(&self, session: &Session) -> Result<Page, BindingError>;
    async fn close_session(&self, session: &Session) -> Result<(), BindingError>;
    async fn close_page(&self, page: &Page) -> Result<(), BindingError>;
}

struct FleetEntry {
    browser: Browser,
    _handler: JoinHandle<()>,
    held: AtomicBool,
}

/// Local `chromiumoxide`-backed stand-in for the remote fleet's control
/// plane, bounded by `max_concurrent`.
pub struct ChromiumoxideBinding {
    entries: DashMap<String, FleetEntry>,
    max_concurrent: u32,
    acquisitions_allowed: AtomicU32,
    headless: bool,
}

impl ChromiumoxideBinding {
    pub fn new(max_concurrent: u32, acquisitions_allowed: u32, headless: bool) -> Self {
        Self {
            entries: DashMap::new(),
            max_concurrent,
            acquisitions_allowed: AtomicU32::new(acquisitions_allowed),
            headless,
        }
    }

    async fn launch_browser(&self) -> Result<(Browser, JoinHandle<()>), BindingError> {
        let profile = create_unique_profile_with_prefix("weblinq_session")
            .map_err(|e| BindingError::Transient(e.to_string()))?;
        let user_data_dir = profile.into_path();

        let mut builder = BrowserConfigBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .window_size(1920, 1080)
            .user_data_dir(user_data_dir)
            .arg(format!("--user-agent={DESKTOP_USER_AGENT}"))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox");

        builder = if self.headless {
            builder.headless_mode(HeadlessMode::default())
        } else {
            builder.with_head()
        };

        let browser_config = builder
            .build()
            .map_err(|e| BindingError::Transient(format!("bad browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BindingError::Transient(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!(error = %e, "browser handler event error");
                }
            }
        });

        Ok((browser, handler_task))
    }
}

#[async_trait]
impl BrowserBinding for ChromiumoxideBinding {
    async fn launch(&self, _keep_alive: Duration) -> Result<Session, BindingError> {
        let total = self.entries.len() as u32;
        if total >= self.max_concurrent {
            return Err(BindingError::QuotaExceeded {
                wait_until: Instant::now() + Duration::from_secs(5),
            });
        }
        if self
            .acquisitions_allowed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n == 0 {
                    None
                } else {
                    Some(n - 1)
                }
            })
            .is_err()
        {
            return Err(BindingError::QuotaExceeded {
                wait_until: Instant::now() + Duration::from_secs(5),
            });
        }

        let (browser, handler) = self.launch_browser().await?;
        let session_id = Uuid::new_v4().to_string();
        self.entries.insert(
            session_id.clone(),
            FleetEntry {
                browser,
                _handler: handler,
                held: AtomicBool::new(true),
            },
        );

        tracing::debug!(session_id, "launched new browser session");
        Ok(Session {
            session_id,
            started_at: Instant::now(),
        })
    }

    async fn connect(&self, session_id: &str) -> Result<Session, BindingError> {
        let entry = self
            .entries
            .get(session_id)
            .ok_or_else(|| BindingError::SessionGone(session_id.to_string()))?;

        if entry
            .held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BindingError::SessionGone(format!(
                "{session_id} already held (possibly by a co-tenant)"
            )));
        }

        Ok(Session {
            session_id: session_id.to_string(),
            started_at: Instant::now(),
        })
    }

    async fn list_sessions(&self) -> Result<Vec<SessionDescriptor>, BindingError> {
        Ok(self
            .entries
            .iter()
            .map(|entry| SessionDescriptor {
                session_id: entry.key().clone(),
                has_connection: entry.value().held.load(Ordering::SeqCst),
            })
            .collect())
    }

    async fn quota(&self) -> Result<PoolQuota, BindingError> {
        let active = self
            .entries
            .iter()
            .filter(|e| e.value().held.load(Ordering::SeqCst))
            .count() as u32;
        Ok(PoolQuota {
            max_concurrent: self.max_concurrent,
            active,
            acquisitions_allowed: self.acquisitions_allowed.load(Ordering::SeqCst),
            wait_until: Instant::now(),
        })
    }

    async fn new_page(&self, session: &Session) -> Result<Page, BindingError> {
        let entry = self
            .entries
            .get(&session.session_id)
            .ok_or_else(|| BindingError::SessionGone(session.session_id.clone()))?;
        entry
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BindingError::Transient(e.to_string()))
    }

    async fn close_session(&self, session: &Session) -> Result<(), BindingError> {
        if let Some(entry) = self.entries.get(&session.session_id) {
            entry.held.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn close_page(&self, page: &Page) -> Result<(), BindingError> {
        page.clone()
            .close()
            .await
            .map_err(|e| BindingError::Transient(e.to_string()))?;
        Ok(())
    }
}

/// Shared pointer type every collaborator above `BrowserBinding` depends on.
pub type SharedBinding = Arc<dyn BrowserBinding>;

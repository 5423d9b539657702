//! State shared between the protocol context and everyone else.
//!
//! ```text
//! ┌──────────────┐ publish()/fail()  ┌──────────────────┐
//! │ auth service │──────────────────▶│                  │
//! └──────────────┘                   │  SessionShared   │◀── Session (protocol ctx)
//! ┌──────────────┐ request_speech()  │  flags · token   │
//! │ capture task │──────────────────▶│  signal · queue  │
//! └──────────────┘                   └──────────────────┘
//! ```
//!
//! Readiness flags are plain atomics.  Every change that a waiter may care
//! about also fires `changed`, so the credential wait re-checks the flags
//! instead of trusting the wake-up.  Speech requests are marshalled onto the
//! protocol context through a bounded channel, never executed in place.

use core::cell::RefCell;
use core::fmt;
use core::future::Future;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use core::time::Duration;
use std::sync::Arc;

use async_io_mini::Timer;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::{info, warn};

use crate::app::ports::BoxedAudioSource;
use crate::error::{Error, Result};

/// Depth of the cross-context request queue.
pub const REQUEST_QUEUE_DEPTH: usize = 4;

/// Session-wide synchronization flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SyncFlag {
    /// A bearer token is held and has not been rejected.
    CredentialValid = 0b0000_0010,
    /// The downchannel answered `200` and its headers are complete.
    DownchannelReady = 0b0000_1000,
}

impl SyncFlag {
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

/// Bearer token.  Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// `authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<{} bytes>)", self.0.len())
    }
}

/// Work handed to the protocol context.
pub enum SessionRequest {
    SendSpeech(BoxedAudioSource),
    Shutdown,
}

impl fmt::Debug for SessionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendSpeech(src) => write!(f, "SendSpeech({} B)", src.remaining()),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

pub struct SessionShared {
    flags: AtomicU8,
    credential: Mutex<CriticalSectionRawMutex, RefCell<Option<Credential>>>,
    refresh_failed: AtomicBool,
    changed: Signal<CriticalSectionRawMutex, ()>,
    requests: Channel<CriticalSectionRawMutex, SessionRequest, REQUEST_QUEUE_DEPTH>,
}

impl Default for SessionShared {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionShared {
    pub fn new() -> Self {
        Self {
            flags: AtomicU8::new(0),
            credential: Mutex::new(RefCell::new(None)),
            refresh_failed: AtomicBool::new(false),
            changed: Signal::new(),
            requests: Channel::new(),
        }
    }

    pub fn is_set(&self, flag: SyncFlag) -> bool {
        self.flags.load(Ordering::Acquire) & flag.mask() != 0
    }

    pub fn set(&self, flag: SyncFlag) {
        self.flags.fetch_or(flag.mask(), Ordering::AcqRel);
        self.changed.signal(());
    }

    pub fn clear(&self, flag: SyncFlag) {
        self.flags.fetch_and(!flag.mask(), Ordering::AcqRel);
        self.changed.signal(());
    }

    /// Current `authorization` header value, if a credential is held.
    pub fn bearer(&self) -> Option<String> {
        self.credential
            .lock(|c| c.borrow().as_ref().map(Credential::bearer))
    }

    /// Drop the held credential and mark it invalid.
    pub fn invalidate_credential(&self) {
        self.credential.lock(|c| c.borrow_mut().take());
        self.clear(SyncFlag::CredentialValid);
    }

    /// Forget a failure reported by an earlier refresh.
    pub fn reset_refresh_state(&self) {
        self.refresh_failed.store(false, Ordering::Release);
    }

    /// Wait until a credential is valid or the refresh fails.
    ///
    /// Unbounded; wrap in [`bounded`].  Dropping the future cancels the wait.
    pub async fn wait_for_credential(&self) -> Result<()> {
        loop {
            if self.is_set(SyncFlag::CredentialValid) {
                return Ok(());
            }
            if self.refresh_failed.swap(false, Ordering::AcqRel) {
                return Err(Error::CredentialRefreshFailed);
            }
            self.changed.wait().await;
        }
    }

    pub(crate) fn try_next_request(&self) -> Option<SessionRequest> {
        self.requests.try_receive().ok()
    }

    fn replace_credential(&self, credential: Credential) {
        self.credential
            .lock(|c| *c.borrow_mut() = Some(credential));
        self.refresh_failed.store(false, Ordering::Release);
        self.set(SyncFlag::CredentialValid);
    }

    fn report_refresh_failure(&self) {
        self.refresh_failed.store(true, Ordering::Release);
        self.changed.signal(());
    }
}

/// Completion side of a credential refresh.  Usable from any context.
#[derive(Clone)]
pub struct CredentialPublisher {
    shared: Arc<SessionShared>,
}

impl CredentialPublisher {
    pub(crate) fn new(shared: Arc<SessionShared>) -> Self {
        Self { shared }
    }

    /// Replace the held credential and wake the waiter.
    pub fn publish(&self, token: impl Into<String>) {
        let credential = Credential::new(token);
        info!("AUTH | credential updated ({} bytes)", credential.len());
        self.shared.replace_credential(credential);
    }

    /// Report that the refresh could not complete.
    pub fn fail(&self) {
        warn!("AUTH | credential refresh failed");
        self.shared.report_refresh_failure();
    }
}

/// Producer-side view of the session for other execution contexts.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    pub(crate) fn new(shared: Arc<SessionShared>) -> Self {
        Self { shared }
    }

    /// Queue a speech upload for the protocol context.
    pub fn request_speech(&self, source: BoxedAudioSource) -> Result<()> {
        self.shared
            .requests
            .try_send(SessionRequest::SendSpeech(source))
            .map_err(|_| Error::RequestQueueFull)
    }

    /// Ask the protocol context to close every stream.
    pub fn request_shutdown(&self) -> Result<()> {
        self.shared
            .requests
            .try_send(SessionRequest::Shutdown)
            .map_err(|_| Error::RequestQueueFull)
    }

    pub fn is_set(&self, flag: SyncFlag) -> bool {
        self.shared.is_set(flag)
    }
}

/// Run `fut` for at most `timeout`, failing with `on_timeout` when it elapses.
pub async fn bounded<T, F>(timeout: Duration, on_timeout: Error, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    futures_lite::future::or(fut, async {
        Timer::after(timeout).await;
        Err(on_timeout)
    })
    .await
}

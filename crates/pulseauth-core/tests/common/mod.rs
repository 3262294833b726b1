//! Scripted backend shared by the lifecycle tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use pulseauth_core::error::TransportError;
use pulseauth_core::{
    AuthGrant, AuthManager, BackendClient, Error, LoginCredentials, MemoryStorage, Principal,
    SessionConfig, Token, TokioClock, Verified,
};

/// What the backend answers to the next call of one operation.
#[derive(Debug, Clone)]
pub enum Reply {
    Grant {
        token: &'static str,
        expires_in_ms: Option<u64>,
        principal: Option<Principal>,
    },
    Unauthorized,
    NetworkDown,
}

impl Reply {
    pub fn grant(token: &'static str, expires_in_ms: u64) -> Self {
        Reply::Grant {
            token,
            expires_in_ms: Some(expires_in_ms),
            principal: Some(alice()),
        }
    }

    fn into_grant(self) -> pulseauth_core::Result<AuthGrant> {
        match self {
            Reply::Grant {
                token,
                expires_in_ms,
                principal,
            } => Ok(AuthGrant {
                token: Token::new(token)?,
                expires_in: expires_in_ms.map(Duration::from_millis),
                principal,
            }),
            Reply::Unauthorized => Err(Error::AuthInvalid { status: 401 }),
            Reply::NetworkDown => Err(Error::Transport(TransportError::Connection {
                message: "connection refused".into(),
            })),
        }
    }
}

#[derive(Default)]
struct Script {
    login: VecDeque<Reply>,
    verify: VecDeque<Reply>,
    refresh: VecDeque<Reply>,
}

/// A backend that answers from per-operation queues, after `latency`.
///
/// An exhausted queue answers `NetworkDown`.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
    latency: Mutex<Duration>,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    verify_times: Mutex<Vec<Instant>>,
    refreshed_tokens: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_latency(self: Arc<Self>, latency: Duration) -> Arc<Self> {
        *self.latency.lock().unwrap() = latency;
        self
    }

    pub fn on_login(&self, reply: Reply) {
        self.script.lock().unwrap().login.push_back(reply);
    }

    pub fn on_verify(&self, reply: Reply) {
        self.script.lock().unwrap().verify.push_back(reply);
    }

    pub fn on_refresh(&self, reply: Reply) {
        self.script.lock().unwrap().refresh.push_back(reply);
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn verify_times(&self) -> Vec<Instant> {
        self.verify_times.lock().unwrap().clone()
    }

    pub fn refreshed_tokens(&self) -> Vec<String> {
        self.refreshed_tokens.lock().unwrap().clone()
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl BackendClient for ScriptedBackend {
    async fn login(&self, _credentials: &LoginCredentials) -> pulseauth_core::Result<AuthGrant> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        let reply = self.script.lock().unwrap().login.pop_front();
        reply.unwrap_or(Reply::NetworkDown).into_grant()
    }

    async fn verify(&self, _token: &Token) -> pulseauth_core::Result<Verified> {
        self.verify_times.lock().unwrap().push(Instant::now());
        self.delay().await;
        let reply = self.script.lock().unwrap().verify.pop_front();
        let grant = reply.unwrap_or(Reply::NetworkDown).into_grant()?;
        Ok(Verified {
            principal: grant.principal.unwrap_or_else(alice),
            expires_in: grant.expires_in,
        })
    }

    async fn refresh(&self, token: &Token) -> pulseauth_core::Result<AuthGrant> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refreshed_tokens
            .lock()
            .unwrap()
            .push(token.as_str().to_string());
        self.delay().await;
        let reply = self.script.lock().unwrap().refresh.pop_front();
        reply.unwrap_or(Reply::NetworkDown).into_grant()
    }
}

pub fn alice() -> Principal {
    Principal::new("1", "alice")
        .with_email("alice@example.com")
        .with_role("athlete")
}

pub const HOUR_MS: u64 = 3_600_000;
pub const LEAD_MS: u64 = 300_000;

pub struct Harness {
    pub manager: AuthManager,
    pub backend: Arc<ScriptedBackend>,
    pub storage: Arc<MemoryStorage>,
    pub clock: Arc<TokioClock>,
}

impl Harness {
    pub fn new(backend: Arc<ScriptedBackend>) -> Self {
        Self::with_storage(backend, Arc::new(MemoryStorage::new()))
    }

    pub fn with_storage(backend: Arc<ScriptedBackend>, storage: Arc<MemoryStorage>) -> Self {
        let clock = Arc::new(TokioClock::new());
        let manager = AuthManager::with_clock(
            backend.clone(),
            storage.clone(),
            SessionConfig::default(),
            clock.clone(),
        );
        Self {
            manager,
            backend,
            storage,
            clock,
        }
    }
}

/// Let spawned tasks run until the runtime is idle.
///
/// Under paused time this advances the clock by one millisecond.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn creds() -> LoginCredentials {
    LoginCredentials::new("alice", "pw")
}

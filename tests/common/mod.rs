//! Shared utilities for integration tests.

#![allow(dead_code)]

use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use breaker_guard::admin::{setup_admin_router, AdminState};
use breaker_guard::resilience::clock::TokioClock;
use breaker_guard::{
    CircuitBreakerManager, CircuitOptions, CircuitOptionsUpdate, HealthProbe, RetryConfig,
    ServiceConfig,
};

pub const TEST_API_KEY: &str = "test-admin-key";

/// Probe whose answer is flipped by the test and which counts its calls.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    healthy: AtomicBool,
    calls: AtomicU32,
}

impl ScriptedProbe {
    pub fn new(healthy: bool) -> Arc<Self> {
        Arc::new(Self {
            healthy: AtomicBool::new(healthy),
            calls: AtomicU32::new(0),
        })
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn check(&self, _target: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.healthy.load(Ordering::SeqCst)
    }
}

/// Manager on tokio time with a scripted probe.
pub fn manager_with(
    defaults: CircuitOptions,
    retry: RetryConfig,
    probe: Arc<ScriptedProbe>,
) -> CircuitBreakerManager {
    CircuitBreakerManager::new(defaults, retry, probe, Arc::new(TokioClock))
}

pub fn manager() -> CircuitBreakerManager {
    manager_with(
        CircuitOptions::default(),
        RetryConfig::default(),
        ScriptedProbe::new(true),
    )
}

pub fn threshold(failure_threshold: u32, reset_timeout_ms: u64) -> CircuitOptionsUpdate {
    CircuitOptionsUpdate {
        failure_threshold: Some(failure_threshold),
        reset_timeout_ms: Some(reset_timeout_ms),
        ..Default::default()
    }
}

/// Operation that bumps `counter` and then fails.
pub async fn failing(counter: Arc<AtomicU32>) -> Result<(), String> {
    counter.fetch_add(1, Ordering::SeqCst);
    Err("boom".to_string())
}

/// Operation that bumps `counter` and then succeeds.
pub async fn succeeding(counter: Arc<AtomicU32>) -> Result<&'static str, String> {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok("ok")
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Serve the admin router for `manager` on an ephemeral port.
pub async fn start_admin(manager: CircuitBreakerManager) -> SocketAddr {
    let mut config = ServiceConfig::default();
    config.admin.api_key = TEST_API_KEY.to_string();
    let state = AdminState::new(manager, Arc::new(ArcSwap::from_pointee(config)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, setup_admin_router(state)).await.unwrap();
    });
    addr
}

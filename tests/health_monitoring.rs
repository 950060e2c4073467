//! Per-circuit probe timers, the global sweep and the HTTP probe.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use breaker_guard::{
    CircuitOptions, CircuitOptionsUpdate, CircuitState, HealthProbe, HealthStatus, HttpProbe,
    RetryConfig, Shutdown,
};

mod common;
use common::{failing, manager_with, start_programmable_backend, succeeding, ScriptedProbe};

fn probed(failure_threshold: u32, reset_timeout_ms: u64, interval_ms: u64) -> CircuitOptionsUpdate {
    CircuitOptionsUpdate {
        failure_threshold: Some(failure_threshold),
        reset_timeout_ms: Some(reset_timeout_ms),
        health_check_interval_ms: Some(interval_ms),
        health_check_path: Some("http://dependency.local/health".to_string()),
        ..Default::default()
    }
}

fn scripted_manager(probe: Arc<ScriptedProbe>) -> breaker_guard::CircuitBreakerManager {
    manager_with(CircuitOptions::default(), RetryConfig::default(), probe)
}

#[tokio::test(start_paused = true)]
async fn test_healthy_probe_moves_open_to_half_open() {
    let probe = ScriptedProbe::new(true);
    let manager = scripted_manager(probe.clone());
    let opts = probed(1, 3_000, 1_000);
    let calls = Arc::new(AtomicU32::new(0));

    let _ = manager.execute("db", || failing(calls.clone()), Some(&opts)).await;
    assert_eq!(manager.get_circuit_status("db").unwrap().state, CircuitState::Open);

    time::sleep(Duration::from_millis(2_500)).await;
    let status = manager.get_circuit_status("db").unwrap();
    assert_eq!(status.state, CircuitState::Open);
    assert_eq!(status.health_check_status, HealthStatus::Healthy);

    time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(manager.get_circuit_status("db").unwrap().state, CircuitState::HalfOpen);
    assert_eq!(probe.calls(), 3);

    let result = manager.execute("db", || succeeding(calls.clone()), Some(&opts)).await;
    assert_eq!(result.unwrap(), "ok");
    assert_eq!(manager.get_circuit_status("db").unwrap().state, CircuitState::Closed);
    manager.cleanup();
}

#[tokio::test(start_paused = true)]
async fn test_unhealthy_probe_leaves_circuit_open() {
    let probe = ScriptedProbe::new(false);
    let manager = scripted_manager(probe.clone());
    let opts = probed(1, 1_000, 500);
    let calls = Arc::new(AtomicU32::new(0));

    let _ = manager.execute("db", || failing(calls.clone()), Some(&opts)).await;
    time::sleep(Duration::from_millis(2_200)).await;

    let status = manager.get_circuit_status("db").unwrap();
    assert_eq!(status.state, CircuitState::Open);
    assert_eq!(status.health_check_status, HealthStatus::Unhealthy);
    assert_eq!(probe.calls(), 4);
    manager.cleanup();
}

#[tokio::test(start_paused = true)]
async fn test_remove_cancels_probe_timer() {
    let probe = ScriptedProbe::new(true);
    let manager = scripted_manager(probe.clone());
    manager.declare_circuit("db", Some(&probed(5, 60_000, 1_000))).unwrap();

    time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(probe.calls(), 2);

    assert!(manager.remove_circuit("db"));
    time::sleep(Duration::from_millis(5_000)).await;
    assert_eq!(probe.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disabling_health_checks_stops_timer() {
    let probe = ScriptedProbe::new(true);
    let manager = scripted_manager(probe.clone());
    manager.declare_circuit("db", Some(&probed(5, 60_000, 1_000))).unwrap();

    time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(probe.calls(), 1);

    let disable = CircuitOptionsUpdate {
        health_check_interval_ms: Some(0),
        ..Default::default()
    };
    assert!(manager.update_circuit_options("db", &disable));
    time::sleep(Duration::from_millis(5_000)).await;
    assert_eq!(probe.calls(), 1);

    let faster = CircuitOptionsUpdate {
        health_check_interval_ms: Some(200),
        ..Default::default()
    };
    assert!(manager.update_circuit_options("db", &faster));
    time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(probe.calls(), 6);
    manager.cleanup();
}

#[tokio::test(start_paused = true)]
async fn test_sweep_probes_circuits_with_target_until_shutdown() {
    let probe = ScriptedProbe::new(true);
    let manager = scripted_manager(probe.clone());
    let target_only = CircuitOptionsUpdate {
        health_check_path: Some("http://dependency.local/health".to_string()),
        ..Default::default()
    };
    manager.declare_circuit("with-target", Some(&target_only)).unwrap();
    manager.declare_circuit("without-target", None).unwrap();

    let shutdown = Shutdown::new();
    manager.start_health_sweep(Duration::from_millis(1_000), shutdown.subscribe());
    assert!(manager.health_sweep_running());

    time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(probe.calls(), 2);
    assert_eq!(
        manager.get_circuit_status("with-target").unwrap().health_check_status,
        HealthStatus::Healthy
    );
    assert_eq!(
        manager.get_circuit_status("without-target").unwrap().health_check_status,
        HealthStatus::Unknown
    );

    shutdown.trigger();
    time::sleep(Duration::from_millis(10)).await;
    assert!(!manager.health_sweep_running());

    time::sleep(Duration::from_millis(3_000)).await;
    assert_eq!(probe.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_stops_sweep_and_forgets_circuits() {
    let probe = ScriptedProbe::new(true);
    let manager = scripted_manager(probe.clone());
    manager.declare_circuit("db", Some(&probed(5, 60_000, 1_000))).unwrap();

    let shutdown = Shutdown::new();
    manager.start_health_sweep(Duration::from_millis(1_000), shutdown.subscribe());

    manager.cleanup();
    assert!(!manager.health_sweep_running());
    assert!(manager.circuit_names().is_empty());

    time::sleep(Duration::from_millis(5_000)).await;
    assert_eq!(probe.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_immediate_check_of_all_circuits() {
    let probe = ScriptedProbe::new(false);
    let manager = scripted_manager(probe.clone());
    let target_only = CircuitOptionsUpdate {
        health_check_path: Some("http://dependency.local/health".to_string()),
        ..Default::default()
    };
    manager.declare_circuit("a", Some(&target_only)).unwrap();
    manager.declare_circuit("b", Some(&target_only)).unwrap();
    manager.declare_circuit("c", None).unwrap();

    manager.check_all_circuits_health().await;

    assert_eq!(probe.calls(), 2);
    assert_eq!(
        manager.get_circuit_status("a").unwrap().health_check_status,
        HealthStatus::Unhealthy
    );
}

#[tokio::test]
async fn test_http_probe_classifies_responses() {
    let healthy = start_programmable_backend(|| async { (200, "OK".to_string()) }).await;
    let failing_backend = start_programmable_backend(|| async { (503, "Unavailable".to_string()) }).await;
    let closed = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let probe = HttpProbe::new(Duration::from_secs(2));
    assert!(probe.check(&format!("http://{healthy}/health")).await);
    assert!(!probe.check(&format!("http://{failing_backend}/health")).await);
    assert!(!probe.check(&format!("http://{closed}/health")).await);
}

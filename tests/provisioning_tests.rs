//! Integration test: artifact provisioning across workers

mod common;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use common::{provisioning_config, store, write_bundle, FakeSource, LABELS};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use student_status_service::artifacts::{
    ArtifactSource, HttpArtifactSource, Provisioner, ProvisioningLock, ProvisioningRole,
    ProvisioningState,
};
use student_status_service::error::ProvisioningError;

#[tokio::test]
async fn test_owner_downloads_once() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path());
    let source = FakeSource::serving(&[b"MODEL v1"]);
    let calls = source.calls();

    let mut provisioner = Provisioner::new(store(dir.path()), source, &provisioning_config());
    let provisioned = provisioner.provision().await.unwrap();

    assert_eq!(provisioned.role, ProvisioningRole::Owner);
    assert_eq!(provisioned.downloads, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(provisioner.state(), ProvisioningState::Loaded);
    assert!(!provisioner.lock().is_held());
    assert_eq!(provisioned.artifacts.label_encoder().classes(), LABELS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_workers_download_once() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path());
    let calls = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..2 {
        let source = FakeSource::serving(&[b"MODEL shared"])
            .with_delay(Duration::from_millis(300))
            .with_counter(calls.clone());
        let mut provisioner = Provisioner::new(store(dir.path()), source, &provisioning_config());
        handles.push(tokio::spawn(async move { provisioner.provision().await }));
    }

    let mut roles = Vec::new();
    let mut labels = Vec::new();
    for handle in handles {
        let provisioned = handle.await.unwrap().unwrap();
        roles.push(provisioned.role);
        labels.push(provisioned.artifacts.label_encoder().classes().to_vec());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(roles.contains(&ProvisioningRole::Owner));
    assert!(roles.contains(&ProvisioningRole::Waiter));
    assert_eq!(labels[0], labels[1]);
    assert!(!dir.path().join("model.lock").exists());
}

#[tokio::test]
async fn test_corrupt_download_retried_once() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path());
    let source = FakeSource::serving(&[b"GARBAGE", b"MODEL v2"]);
    let calls = source.calls();

    let mut provisioner = Provisioner::new(store(dir.path()), source, &provisioning_config());
    let provisioned = provisioner.provision().await.unwrap();

    assert_eq!(provisioned.downloads, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        std::fs::read(dir.path().join("ann_student_status.onnx")).unwrap(),
        b"MODEL v2"
    );
}

#[tokio::test]
async fn test_persistently_corrupt_download_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path());
    let source = FakeSource::serving(&[b"GARBAGE"]);
    let calls = source.calls();

    let mut provisioner = Provisioner::new(store(dir.path()), source, &provisioning_config());
    let err = provisioner.provision().await.unwrap_err();

    assert!(matches!(err, ProvisioningError::Reload(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(provisioner.state(), ProvisioningState::Failed);
    assert!(!provisioner.lock().is_held());
}

#[tokio::test]
async fn test_download_failure_releases_lock() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path());

    let mut provisioner =
        Provisioner::new(store(dir.path()), FakeSource::failing(), &provisioning_config());
    let err = provisioner.provision().await.unwrap_err();

    assert!(matches!(err, ProvisioningError::Download { .. }));
    assert_eq!(provisioner.state(), ProvisioningState::Failed);
    assert!(!dir.path().join("model.lock").exists());
}

#[tokio::test]
async fn test_waiter_gives_up_on_abandoned_lock() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path());
    let lock = ProvisioningLock::new(dir.path().join("model.lock"));
    let guard = lock.try_acquire().unwrap().unwrap();

    let config = student_status_service::config::ProvisioningConfig {
        wait_timeout_secs: 1,
        ..provisioning_config()
    };
    let source = FakeSource::serving(&[b"MODEL"]);
    let calls = source.calls();
    let mut provisioner = Provisioner::new(store(dir.path()), source, &config);
    let err = provisioner.provision().await.unwrap_err();

    assert!(matches!(err, ProvisioningError::WaitTimeout { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    // Someone else's lock stays put
    assert!(lock.is_held());
    drop(guard);
}

#[tokio::test]
async fn test_waiter_loads_after_release() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path());
    let lock = ProvisioningLock::new(dir.path().join("model.lock"));
    let guard = lock.try_acquire().unwrap().unwrap();

    let model_path = dir.path().join("ann_student_status.onnx");
    let owner = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(model_path, b"MODEL from owner").unwrap();
        guard.release().unwrap();
    });

    let source = FakeSource::serving(&[b"MODEL"]);
    let calls = source.calls();
    let mut provisioner = Provisioner::new(store(dir.path()), source, &provisioning_config());
    let provisioned = provisioner.provision().await.unwrap();
    owner.await.unwrap();

    assert_eq!(provisioned.role, ProvisioningRole::Waiter);
    assert_eq!(provisioned.downloads, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stale_artifact_replaced() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path());
    let model_path = dir.path().join("ann_student_status.onnx");
    std::fs::write(&model_path, b"MODEL stale").unwrap();
    let leftover = dir.path().join("ann_student_status.onnx.0000.part");
    std::fs::write(&leftover, b"MOD").unwrap();

    let source = FakeSource::serving(&[b"MODEL fresh"]);
    let mut provisioner = Provisioner::new(store(dir.path()), source, &provisioning_config());
    provisioner.provision().await.unwrap();

    assert_eq!(std::fs::read(&model_path).unwrap(), b"MODEL fresh");
    assert!(!leftover.exists());
}

#[tokio::test]
async fn test_missing_artifact_dir_is_lock_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");

    let mut provisioner = Provisioner::new(
        store(&missing),
        FakeSource::serving(&[b"MODEL"]),
        &provisioning_config(),
    );
    let err = provisioner.provision().await.unwrap_err();

    assert!(matches!(err, ProvisioningError::Lock { .. }));
}

async fn serve_model() -> std::net::SocketAddr {
    let app = Router::new()
        .route("/model.onnx", get(|| async { "MODEL over http" }))
        .route("/gone.onnx", get(|| async { StatusCode::NOT_FOUND }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_http_source_downloads_and_provisions() {
    let addr = serve_model().await;
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path());

    let config = student_status_service::config::ProvisioningConfig {
        model_url: format!("http://{addr}/model.onnx"),
        ..provisioning_config()
    };
    let source = HttpArtifactSource::new(&config).unwrap();
    let mut provisioner = Provisioner::new(store(dir.path()), source, &config);
    let provisioned = provisioner.provision().await.unwrap();

    assert_eq!(provisioned.role, ProvisioningRole::Owner);
    assert_eq!(
        std::fs::read(dir.path().join("ann_student_status.onnx")).unwrap(),
        b"MODEL over http"
    );
}

#[tokio::test]
async fn test_http_source_error_status_leaves_nothing_behind() {
    let addr = serve_model().await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("ann_student_status.onnx");

    let config = student_status_service::config::ProvisioningConfig {
        model_url: format!("http://{addr}/gone.onnx"),
        ..provisioning_config()
    };
    let source = HttpArtifactSource::new(&config).unwrap();
    let err = source.fetch(&dest).await.unwrap_err();

    assert!(matches!(err, ProvisioningError::Download { .. }));
    assert!(!dest.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_http_source_requires_url() {
    let config = student_status_service::config::ProvisioningConfig::default();
    assert!(matches!(
        HttpArtifactSource::new(&config),
        Err(ProvisioningError::Download { .. })
    ));
}

use std::time::{Duration, Instant};

use regbench_loadgen::benchmark::execute;
use regbench_loadgen::config::Config;
use regbench_loadgen::http::HttpRemote;
use regbench_loadgen::orchestration::Orchestration;
use regbench_loadgen::readiness::{Readiness, ReadinessError};
use regbench_loadgen::run;
use regbench_loadgen::workload::{Weights, Workload};
use regbench_test::server::{Options, TestServer};
use regbench_types::{Operation, OperationRecord};

fn workload(iterations: u64, prewarm: u64) -> Workload {
    Workload::builder()
        .seed(42)
        .iterations(iterations)
        .prewarm(prewarm)
        .build()
        .unwrap()
}

fn operations(records: &[OperationRecord]) -> Vec<Operation> {
    records.iter().map(|record| record.op).collect()
}

#[tokio::test]
async fn records_every_iteration() {
    regbench_test::tracing::init();
    let server = TestServer::new().await;
    let remote = HttpRemote::new(server.descriptors_url());
    let mut workload = workload(60, 10);

    let records = run(&remote, &mut workload, 10).await;

    assert_eq!(records.len(), 60);
    for (idx, record) in records.iter().enumerate() {
        assert_eq!(record.iter, idx as u64);
        assert!(record.duration_nanos.is_some());
        assert!(record.duration_millis.is_none());
        assert!(record.request_url.is_none());
    }
    assert!(records[..10].iter().all(|r| r.op == Operation::Create));
    assert!(records.iter().all(|r| r.ok), "{records:#?}");
}

#[tokio::test]
async fn prewarm_covering_the_run_only_creates() {
    let server = TestServer::new().await;
    let remote = HttpRemote::new(server.descriptors_url());
    let mut workload = workload(25, 25);

    let records = run(&remote, &mut workload, 100).await;

    assert!(records.iter().all(|r| r.op == Operation::Create));
    assert_eq!(server.descriptor_count(), 25);
}

#[tokio::test]
async fn pool_matches_successful_creates() {
    regbench_test::tracing::init();
    let server = TestServer::with_options(Options {
        fail_every_nth_create: Some(3),
    })
    .await;
    let remote = HttpRemote::new(server.descriptors_url());
    let mut workload = workload(90, 15);

    let records = run(&remote, &mut workload, 100).await;

    let creates: Vec<_> = records
        .iter()
        .filter(|r| r.op == Operation::Create)
        .collect();
    let successful = creates.iter().filter(|r| r.ok).count();
    let failed: Vec<_> = creates.iter().filter(|r| !r.ok).collect();

    assert_eq!(creates.len(), server.create_attempts());
    assert!(!failed.is_empty());
    assert!(failed.iter().all(|r| r.status_code == Some(500)));
    assert_eq!(workload.pool().len(), successful);
    assert_eq!(workload.pool().len(), server.descriptor_count());
    assert_eq!(workload.pool().descriptors(), server.descriptor_ids());
    // the default template carries one sub-resource per descriptor
    assert_eq!(workload.pool().sub_resource_len(), successful);
}

#[tokio::test]
async fn transport_failures_do_not_abort_the_run() {
    regbench_test::tracing::init();
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let remote = HttpRemote::new(format!("http://127.0.0.1:{port}/shell-descriptors"));
    let mut workload = workload(30, 5);

    let records = run(&remote, &mut workload, 100).await;

    assert_eq!(records.len(), 30);
    assert!(records.iter().all(|r| !r.ok && r.status_code.is_none()));
    assert!(workload.pool().is_empty());
    // nothing was ever created, so no read can have been issued
    assert!(records.iter().all(|r| r.op != Operation::Read));
}

#[tokio::test]
async fn selection_is_reproducible() {
    let first = TestServer::new().await;
    let second = TestServer::new().await;

    let records_a = run(
        &HttpRemote::new(first.descriptors_url()),
        &mut workload(120, 10),
        100,
    )
    .await;
    let records_b = run(
        &HttpRemote::new(second.descriptors_url()),
        &mut workload(120, 10),
        100,
    )
    .await;

    assert_eq!(operations(&records_a), operations(&records_b));
    assert_eq!(first.descriptor_count(), second.descriptor_count());
}

#[tokio::test]
async fn reads_find_created_descriptors() {
    let server = TestServer::new().await;
    let remote = HttpRemote::new(server.descriptors_url());
    let mut workload = Workload::builder()
        .iterations(40)
        .prewarm(5)
        .weights(Weights {
            create: 0.0,
            read: 1.0,
            list: 0.0,
            search_paginated: 0.0,
        })
        .build()
        .unwrap();

    let records = run(&remote, &mut workload, 100).await;

    let reads: Vec<_> = records
        .iter()
        .filter(|r| r.op == Operation::Read)
        .collect();
    assert_eq!(reads.len(), 35);
    assert!(reads.iter().all(|r| r.ok && r.status_code == Some(200)));
}

#[tokio::test]
async fn captures_request_details() {
    let server = TestServer::new().await;
    let remote = HttpRemote::new(server.descriptors_url()).capture_details(true);
    let mut workload = workload(20, 2);

    let records = run(&remote, &mut workload, 100).await;

    let create = &records[0];
    let body = create.request_body.as_ref().unwrap();
    assert_eq!(create.request_url.as_deref(), Some(server.descriptors_url().as_str()));
    assert_eq!(create.response_body.as_ref().unwrap()["id"], body["id"]);

    assert!(records.iter().all(|r| r.request_url.is_some()));
    assert!(
        records
            .iter()
            .filter(|r| r.op != Operation::Create)
            .all(|r| r.request_body.is_none())
    );

    let json = serde_json::to_value(create).unwrap();
    assert!(json.get("requestUrl").is_some());
    assert!(json.get("durationNanos").is_some());
}

fn quick_readiness() -> Readiness {
    Readiness {
        timeout: Duration::from_millis(300),
        interval: Duration::from_millis(50),
        probe_timeout: Duration::from_millis(100),
        ..Default::default()
    }
}

#[tokio::test]
async fn execute_saves_records_and_stops_target() {
    let server = TestServer::new().await;
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("down");
    let config = Config {
        remote: server.descriptors_url(),
        iterations: 20,
        prewarm: 5,
        output: dir.path().join("results.json"),
        readiness: quick_readiness(),
        orchestration: Orchestration {
            up: None,
            down: Some(format!("touch {}", marker.display())),
        },
        ..Default::default()
    };
    let remote = HttpRemote::new(config.remote.as_str());
    let mut workload = workload(config.iterations, config.prewarm);

    execute(&config, &remote, &mut workload, std::future::pending())
        .await
        .unwrap();

    let contents = std::fs::read_to_string(&config.output).unwrap();
    let records: Vec<OperationRecord> = serde_json::from_str(&contents).unwrap();
    assert_eq!(records.len(), 20);
    assert!(marker.exists());
}

#[tokio::test]
async fn readiness_timeout_stops_target_without_records() {
    regbench_test::tracing::init();
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("down");
    let config = Config {
        remote: format!("http://127.0.0.1:{port}/shell-descriptors"),
        output: dir.path().join("results.json"),
        readiness: quick_readiness(),
        orchestration: Orchestration {
            up: None,
            down: Some(format!("touch {}", marker.display())),
        },
        ..Default::default()
    };
    let remote = HttpRemote::new(config.remote.as_str());
    let mut workload = workload(10, 2);

    let error = execute(&config, &remote, &mut workload, std::future::pending())
        .await
        .unwrap_err();

    assert!(error.downcast_ref::<ReadinessError>().is_some(), "{error:?}");
    assert!(!config.output.exists());
    assert!(marker.exists());
}

#[tokio::test]
async fn interrupt_during_startup_still_stops_target() {
    let server = TestServer::new().await;
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("down");
    let config = Config {
        remote: server.descriptors_url(),
        output: dir.path().join("results.json"),
        readiness: quick_readiness(),
        orchestration: Orchestration {
            up: Some("sleep 5".into()),
            down: Some(format!("touch {}", marker.display())),
        },
        ..Default::default()
    };
    let remote = HttpRemote::new(config.remote.as_str());
    let mut workload = workload(10, 2);

    let started = Instant::now();
    let error = execute(
        &config,
        &remote,
        &mut workload,
        tokio::time::sleep(Duration::from_millis(200)),
    )
    .await
    .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(error.to_string(), "benchmark interrupted");
    assert!(marker.exists());
    assert!(!config.output.exists());
    assert_eq!(server.descriptor_count(), 0);
}

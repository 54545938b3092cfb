use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use tonic::transport::Endpoint;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;
use transponder::config::{Port, ScannerConfig, ServeConfig, Server};
use transponder::scanner::{GrpcScanner, HttpScanner, Probe, ScanReport, Scanner, PROBE_TIMEOUT};
use transponder::server::{self, grpc, ServeOrchestrator};

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn ephemeral() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

fn local_target(http: u16, https: u16, grpc: u16) -> ScannerConfig {
    ScannerConfig {
        servers: vec![Server {
            host: "127.0.0.1".to_string(),
            ports: vec![
                Port { number: http, protocol: "HTTP".to_string() },
                Port { number: https, protocol: "HTTPS".to_string() },
                Port { number: grpc, protocol: "GRPC".to_string() },
            ],
        }],
    }
}

/// Sweeps until every report succeeds; the listeners need a moment to come up.
async fn sweep_until_ok(scanner: &Scanner) -> Vec<ScanReport> {
    let mut last = Vec::new();
    for _ in 0..50 {
        last = scanner.sweep().await;
        if last.iter().all(|r| r.outcome.is_ok()) {
            return last;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("listeners never became reachable: {:?}", last);
}

#[tokio::test]
async fn one_sweep_reaches_every_listener() {
    let hostname = server::local_hostname().unwrap();
    let orchestrator = ServeOrchestrator::new(ServeConfig {
        http_port: 18080,
        https_port: 18443,
        grpc_port: 18081,
    })
    .unwrap();
    let serving = tokio::spawn(orchestrator.run());

    let scanner = Scanner::new(local_target(18080, 18443, 18081))
        .unwrap()
        .with_pause(Duration::ZERO);
    let reports = sweep_until_ok(&scanner).await;

    assert_eq!(reports.len(), 3);
    for report in &reports {
        let body = report.outcome.as_ref().unwrap();
        assert!(body.contains(&hostname), "{}: {}", report.address, body);
    }
    assert!(!serving.is_finished());
    serving.abort();
}

#[tokio::test]
async fn failed_listener_does_not_stop_the_others() {
    let taken = TcpListener::bind("0.0.0.0:0").unwrap();
    let http_port = taken.local_addr().unwrap().port();
    let (https_port, grpc_port) = (free_port(), free_port());

    let orchestrator = ServeOrchestrator::with_hostname(
        ServeConfig { http_port, https_port, grpc_port },
        "survivor",
    );
    let serving = tokio::spawn(orchestrator.run());

    let config = ScannerConfig {
        servers: vec![Server {
            host: "127.0.0.1".to_string(),
            ports: vec![
                Port { number: https_port, protocol: "https".to_string() },
                Port { number: grpc_port, protocol: "grpc".to_string() },
            ],
        }],
    };
    let scanner = Scanner::new(config).unwrap().with_pause(Duration::ZERO);
    let reports = sweep_until_ok(&scanner).await;
    assert_eq!(reports[0].outcome.as_ref().unwrap(), "Hello from survivor\n");
    assert_eq!(reports[1].outcome.as_ref().unwrap(), "Hello from survivor");

    assert!(!serving.is_finished());
    serving.abort();
    drop(taken);
}

#[tokio::test]
async fn grpc_probe_returns_greeting() {
    let (listener, addr) = ephemeral();
    tokio::spawn(grpc::serve_on(listener, Arc::from("grpc-box")));

    let mut outcome = GrpcScanner::new().probe(&addr, PROBE_TIMEOUT).await;
    for _ in 0..20 {
        if outcome.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        outcome = GrpcScanner::new().probe(&addr, PROBE_TIMEOUT).await;
    }
    assert_eq!(outcome.unwrap(), "Hello from grpc-box");
}

#[tokio::test]
async fn health_over_the_wire() {
    let (listener, addr) = ephemeral();
    tokio::spawn(grpc::serve_on(listener, Arc::from("grpc-box")));

    let channel = Endpoint::from_shared(format!("http://{}", addr))
        .unwrap()
        .connect()
        .await
        .unwrap();
    let mut client = HealthClient::new(channel);
    for service in ["", "helloworld.Greeter", "anything.at.All"] {
        let response = client
            .check(HealthCheckRequest { service: service.to_string() })
            .await
            .unwrap();
        assert_eq!(response.into_inner().status, ServingStatus::Serving as i32);
    }

    let status = client
        .watch(HealthCheckRequest { service: "helloworld.Greeter".to_string() })
        .await
        .err()
        .unwrap();
    assert_eq!(status.code(), tonic::Code::Unimplemented);
}

#[tokio::test]
async fn https_probe_trusts_self_signed_listener() {
    use transponder::server::{cert, http};

    let (listener, addr) = ephemeral();
    let material = cert::issue(&cert::CredentialRequest::for_hosts("not-the-dialed-name.example")).unwrap();
    tokio::spawn(http::serve_tls(listener, material.server_config().unwrap(), Arc::from("tls-box")));

    let body = HttpScanner::https().unwrap().probe(&addr, PROBE_TIMEOUT).await.unwrap();
    assert_eq!(body, "Hello from tls-box\n");
}

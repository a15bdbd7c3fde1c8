mod common;

use common::{Harness, GATEWAY_NODE, PLAIN_NODE};
use gateway_control::model::{
    AccessList, DomainRequest, SslTermination, StreamProtocol, TcpServiceRequest, TcpServiceUpdate,
};
use gateway_control::nginx::Activation;

fn request(port: Option<u16>, backend_port: u16) -> TcpServiceRequest {
    TcpServiceRequest {
        port,
        protocol: StreamProtocol::Tcp,
        domain: None,
        node_id: PLAIN_NODE,
        backend_host: None,
        backend_port,
        ssl: false,
        access: AccessList::default(),
        enabled: true,
    }
}

#[tokio::test]
async fn test_create_renders_upstream_then_server() {
    let h = Harness::new();

    let applied = h.engine.tcp.create(request(Some(15432), 5432)).await.unwrap();
    let id = applied.record.identifier.as_str().to_string();

    assert_eq!(applied.activation, Activation::Activated);
    let text = h.read(&h.stream(&id));
    let logs = h.config.paths.logs_dir.join("_").join(format!("{id}_stream.log"));
    assert_eq!(
        text,
        format!(
            "upstream {id} {{\n    server 10.8.0.2:5432;\n}}\n\
             server {{\n    listen 15432;\n    access_log {} stream_logs;\n    proxy_pass {id};\n}}\n",
            logs.display()
        )
    );
    assert_eq!(h.probe.checks(), vec![("10.8.0.2".to_string(), 5432, None)]);
}

#[tokio::test]
async fn test_unreachable_backend_rejects_create() {
    let h = Harness::new();
    h.probe.block_port(6379);

    let err = h.engine.tcp.create(request(None, 6379)).await.unwrap_err();

    assert!(err.is_validation());
    assert!(h.engine.tcp.all().await.unwrap().is_empty());
    assert_eq!(h.runner.count("nginx -t"), 0);

    // The reserved listen port went back to the pool.
    let next = h.engine.tcp.create(request(None, 6380)).await.unwrap().record;
    assert_eq!(next.port, h.config.appliance.stream_ports.start);
}

#[tokio::test]
async fn test_update_to_unreachable_port_leaves_file_untouched() {
    let h = Harness::new();
    let created = h.engine.tcp.create(request(Some(15432), 5432)).await.unwrap().record;
    let file = h.stream(created.identifier.as_str());
    let before = h.read(&file);
    h.probe.block_port(5433);
    h.runner.clear();

    let err = h
        .engine
        .tcp
        .update(
            created.id,
            TcpServiceUpdate {
                backend_port: Some(5433),
                ..TcpServiceUpdate::default()
            },
        )
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(h.read(&file), before);
    assert_eq!(h.engine.tcp.get(created.id).await.unwrap().backend.port, 5432);
    assert!(h.runner.calls().is_empty());
}

#[tokio::test]
async fn test_duplicate_listen_port_is_rejected() {
    let h = Harness::new();
    h.engine.tcp.create(request(Some(15432), 5432)).await.unwrap();

    let err = h.engine.tcp.create(request(Some(15432), 5433)).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_udp_service_listens_udp_and_resets_with_icmp() {
    let h = Harness::new();
    let mut dns = request(Some(5353), 53);
    dns.protocol = StreamProtocol::Udp;
    let created = h.engine.tcp.create(dns).await.unwrap().record;

    assert!(h.read(&h.stream(created.identifier.as_str())).contains("    listen 5353 udp;\n"));

    h.engine.tcp.delete(created.id).await.unwrap();

    assert!(!h.stream(created.identifier.as_str()).exists());
    let calls = h.runner.calls();
    assert!(calls.iter().any(|c| c.starts_with("iptables -A OUTPUT") && c.ends_with("icmp-port-unreachable")));
    assert!(calls.contains(&"conntrack -D -p udp --dst 10.8.0.2 --dport 53".to_string()));
}

#[tokio::test]
async fn test_tls_reuses_domain_certificate() {
    let h = Harness::new();
    let domain = h
        .engine
        .domains
        .create(DomainRequest::new("db.example.com", SslTermination::SelfSigned), false)
        .await
        .unwrap()
        .record;
    let pair = domain.cert_pair.unwrap();

    let mut tls = request(Some(15433), 5432);
    tls.ssl = true;
    tls.domain = Some("db.example.com".into());
    let created = h.engine.tcp.create(tls).await.unwrap().record;

    let text = h.read(&h.stream(created.identifier.as_str()));
    assert!(text.contains("    listen 15433 ssl;\n"));
    assert!(text.contains("    server_name db.example.com;\n"));
    assert!(text.contains(&format!("    ssl_certificate {};\n", pair.certificate.display())));
}

#[tokio::test]
async fn test_tls_without_domain_uses_wildcard_pair() {
    let h = Harness::new();
    let mut tls = request(Some(15434), 5432);
    tls.ssl = true;
    let created = h.engine.tcp.create(tls).await.unwrap().record;

    let wildcard = h.self_signed_dir("_").join("fullchain.pem");
    let text = h.read(&h.stream(created.identifier.as_str()));
    assert!(text.contains(&format!("    ssl_certificate {};\n", wildcard.display())));
}

#[tokio::test]
async fn test_gateway_host_gets_resolver() {
    let h = Harness::new();
    let mut behind = request(Some(15435), 22);
    behind.node_id = GATEWAY_NODE;
    behind.backend_host = Some("git.lan".into());
    let created = h.engine.tcp.create(behind).await.unwrap().record;

    let text = h.read(&h.stream(created.identifier.as_str()));
    assert!(text.contains("    server git.lan:22;\n"));
    assert!(text.contains("    resolver 10.8.0.1 valid=30s;\n"));
    assert_eq!(
        h.probe.checks(),
        vec![("git.lan".to_string(), 22, Some("10.8.0.1".to_string()))]
    );
}

#[tokio::test]
async fn test_disable_then_enable() {
    let h = Harness::new();
    let created = h.engine.tcp.create(request(Some(15432), 5432)).await.unwrap().record;
    let file = h.stream(created.identifier.as_str());

    let disabled = h.engine.tcp.disable(created.id).await.unwrap();
    assert_eq!(disabled.activation, Activation::Skipped);
    assert!(!file.exists());

    // A disabled service is never probed.
    h.probe.block_port(5432);
    h.engine
        .tcp
        .update(
            created.id,
            TcpServiceUpdate {
                port: Some(15440),
                ..TcpServiceUpdate::default()
            },
        )
        .await
        .unwrap();
    assert!(!file.exists());

    let err = h.engine.tcp.enable(created.id).await.unwrap_err();
    assert!(err.is_validation());
    assert!(!file.exists());
}

#[tokio::test]
async fn test_initialize_skips_disabled_services() {
    let h = Harness::new();
    let on = h.engine.tcp.create(request(Some(15432), 5432)).await.unwrap().record;
    let mut off = request(Some(15433), 5433);
    off.enabled = false;
    let off = h.engine.tcp.create(off).await.unwrap().record;
    h.runner.clear();

    let outcomes = h.engine.tcp.initialize().await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].resource, format!("tcp {}", on.identifier));
    assert!(!h.stream(off.identifier.as_str()).exists());
    assert_eq!(h.reloads(), 0);
}

#[tokio::test]
async fn test_move_onto_taken_port_keeps_live_file() {
    let h = Harness::new();
    h.engine.tcp.create(request(Some(15432), 5432)).await.unwrap();
    let second = h.engine.tcp.create(request(Some(15433), 5433)).await.unwrap().record;
    let file = h.stream(second.identifier.as_str());
    let before = h.read(&file);
    h.runner.clear();

    let err = h
        .engine
        .tcp
        .update(
            second.id,
            TcpServiceUpdate {
                port: Some(15432),
                ..TcpServiceUpdate::default()
            },
        )
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(h.read(&file), before);
    assert_eq!(h.engine.tcp.get(second.id).await.unwrap().port, 15433);
    assert_eq!(h.reloads(), 0);
    assert_eq!(h.runner.count_prefix("iptables"), 0);
}

#[tokio::test]
async fn test_tls_on_plain_domain_uses_wildcard_pair() {
    let h = Harness::new();
    h.engine
        .domains
        .create(DomainRequest::new("plain.example.com", SslTermination::None), false)
        .await
        .unwrap();

    let mut tls = request(Some(15436), 5432);
    tls.ssl = true;
    tls.domain = Some("plain.example.com".into());
    let created = h.engine.tcp.create(tls).await.unwrap().record;

    let wildcard = h.self_signed_dir("_").join("fullchain.pem");
    let text = h.read(&h.stream(created.identifier.as_str()));
    assert!(text.contains(&format!("    ssl_certificate {};\n", wildcard.display())));
    assert!(!h.self_signed_dir("plain.example.com").exists());
}

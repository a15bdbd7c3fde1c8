mod common;

use common::{Harness, GATEWAY_NODE, PLAIN_NODE};
use gateway_control::model::{
    AccessList, DomainRequest, HttpServiceRequest, HttpServiceUpdate, SslTermination,
};
use gateway_control::nginx::Activation;

fn request(domain: &str, path: &str) -> HttpServiceRequest {
    HttpServiceRequest {
        domain: Some(domain.to_string()),
        path: path.to_string(),
        node_id: PLAIN_NODE,
        backend_host: None,
        backend_port: 8080,
        scheme: Default::default(),
        access: AccessList::default(),
        require_auth: false,
        enabled: true,
    }
}

#[tokio::test]
async fn test_service_on_new_domain_creates_it_first() {
    let h = Harness::new();

    let applied = h.engine.http.create(request("app.example.com", "/api")).await.unwrap();
    let id = applied.record.identifier.as_str().to_string();

    assert_eq!(applied.activation, Activation::Activated);
    assert!(h.vhost("app.example.com").exists());
    assert!(h.location("app.example.com", "__main").exists());

    let location = h.read(&h.location("app.example.com", "api"));
    assert!(location.starts_with("location /api {\n"));
    assert!(location.contains(&format!("    set ${id} 10.8.0.2;\n")));
    assert!(location.contains(&format!("    proxy_pass http://${id}:8080;\n")));

    // The implicit domain defers; only the service reloads.
    assert_eq!(h.reloads(), 1);
}

#[tokio::test]
async fn test_allow_list_closes_with_deny_all() {
    let h = Harness::new();

    let mut restricted = request("app.example.com", "/admin");
    restricted.access = AccessList {
        allow: vec!["10.0.0.0/8".into()],
        deny: vec!["10.1.2.3".into()],
    };
    h.engine.http.create(restricted).await.unwrap();

    let mut blocked = request("app.example.com", "/public");
    blocked.access = AccessList {
        allow: vec![],
        deny: vec!["192.0.2.0/24".into()],
    };
    h.engine.http.create(blocked).await.unwrap();

    let admin = h.read(&h.location("app.example.com", "admin"));
    assert!(admin.contains("    deny 10.1.2.3;\n    allow 10.0.0.0/8;\n    deny all;\n"));

    let public = h.read(&h.location("app.example.com", "public"));
    assert!(public.contains("    deny 192.0.2.0/24;\n"));
    assert!(!public.contains("deny all;"));
}

#[tokio::test]
async fn test_invalid_access_entry_is_rejected() {
    let h = Harness::new();
    let mut bad = request("app.example.com", "/api");
    bad.access.allow = vec!["not-an-ip".into()];

    let err = h.engine.http.create(bad).await.unwrap_err();

    assert!(err.is_validation());
    assert!(!h.location("app.example.com", "api").exists());
}

#[tokio::test]
async fn test_disabled_service_leaves_no_file() {
    let h = Harness::new();
    let created = h.engine.http.create(request("app.example.com", "/api")).await.unwrap().record;
    let file = h.location("app.example.com", "api");
    assert!(file.exists());

    let applied = h
        .engine
        .http
        .update(
            created.id,
            HttpServiceUpdate {
                enabled: Some(false),
                ..HttpServiceUpdate::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(applied.activation, Activation::Skipped);
    assert!(!file.exists());

    let mut disabled = request("other.example.com", "/x");
    disabled.enabled = false;
    h.engine.http.create(disabled).await.unwrap();
    assert!(!h.location("other.example.com", "x").exists());
}

#[tokio::test]
async fn test_auth_requirement_dropped_without_sidecar() {
    let h = Harness::new();
    h.engine
        .domains
        .create(DomainRequest::new("open.example.com", SslTermination::SelfSigned), false)
        .await
        .unwrap();

    let mut gated = request("open.example.com", "/");
    gated.require_auth = true;
    let applied = h.engine.http.create(gated).await.unwrap();

    assert!(applied.record.require_auth);
    let location = h.read(&h.location("open.example.com", "__main"));
    assert!(!location.contains("auth_request"));
    assert!(location.contains("proxy_pass http://"));
}

#[tokio::test]
async fn test_auth_requirement_honoured_with_sidecar() {
    let h = Harness::new();
    let mut domain = DomainRequest::new("secure.example.com", SslTermination::SelfSigned);
    domain.authentication = true;
    h.engine.domains.create(domain, false).await.unwrap();

    let mut gated = request("secure.example.com", "/app");
    gated.require_auth = true;
    h.engine.http.create(gated).await.unwrap();

    let location = h.read(&h.location("secure.example.com", "app"));
    assert!(location.starts_with("location /app {\n    auth_request /oauth2/auth;\n"));
}

#[tokio::test]
async fn test_gateway_host_uses_node_resolver() {
    let h = Harness::new();
    let mut behind = request("app.example.com", "/nas");
    behind.node_id = GATEWAY_NODE;
    behind.backend_host = Some("nas.lan".into());
    let id = h.engine.http.create(behind).await.unwrap().record.identifier;

    let location = h.read(&h.location("app.example.com", "nas"));
    assert!(location.contains("    resolver 10.8.0.1 valid=30s;\n"));
    assert!(location.contains(&format!("    set ${} nas.lan;\n", id.as_str())));
}

#[tokio::test]
async fn test_path_change_moves_fragment_and_resets_connections() {
    let h = Harness::new();
    let created = h.engine.http.create(request("app.example.com", "/old")).await.unwrap().record;
    h.runner.clear();

    h.engine
        .http
        .update(
            created.id,
            HttpServiceUpdate {
                path: Some("/new/api".into()),
                ..HttpServiceUpdate::default()
            },
        )
        .await
        .unwrap();

    assert!(!h.location("app.example.com", "old").exists());
    assert!(h.location("app.example.com", "new-api").exists());

    let calls = h.runner.calls();
    assert!(calls.iter().any(|c| c.starts_with("iptables -A OUTPUT")));
    assert!(calls.iter().any(|c| c.starts_with("iptables -D OUTPUT")));
    assert!(calls.contains(&"conntrack -D -p tcp --dst 10.8.0.2 --dport 8080".to_string()));
    assert_eq!(h.reloads(), 1);
}

#[tokio::test]
async fn test_failed_connection_reset_does_not_fail_delete() {
    let h = Harness::new();
    let created = h.engine.http.create(request("app.example.com", "/api")).await.unwrap().record;
    h.runner.fail_commands_starting_with("conntrack");

    h.engine.http.delete(created.id).await.unwrap();

    assert!(!h.location("app.example.com", "api").exists());
    assert!(h.engine.http.get(created.id).await.unwrap_err().to_string().contains("not found"));
}

#[tokio::test]
async fn test_service_without_domain_uses_default_locations() {
    let h = Harness::new();
    let mut unbound = request("unused", "/health");
    unbound.domain = None;

    h.engine.http.create(unbound).await.unwrap();

    let file = h.config.paths.locations_dir.join("default/health.conf");
    assert!(file.exists());
    assert!(h.engine.domains.all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_second_service_on_same_path_is_rejected() {
    let h = Harness::new();
    let first = h.engine.http.create(request("app.example.com", "/api")).await.unwrap().record;
    let file = h.location("app.example.com", "api");
    let before = h.read(&file);

    let mut other = request("app.example.com", "/api");
    other.backend_port = 9090;
    let err = h.engine.http.create(other).await.unwrap_err();

    assert!(err.is_validation());
    assert_eq!(h.read(&file), before);
    assert_eq!(h.engine.http.all().await.unwrap().len(), 1);

    h.engine.http.delete(first.id).await.unwrap();
    assert!(!file.exists());
    assert!(h.engine.http.all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_moving_onto_taken_path_keeps_both_files() {
    let h = Harness::new();
    h.engine.http.create(request("app.example.com", "/api")).await.unwrap();
    let second = h.engine.http.create(request("app.example.com", "/web")).await.unwrap().record;
    h.runner.clear();

    let err = h
        .engine
        .http
        .update(
            second.id,
            HttpServiceUpdate {
                path: Some("/api".into()),
                ..HttpServiceUpdate::default()
            },
        )
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(h.location("app.example.com", "api").exists());
    assert!(h.location("app.example.com", "web").exists());
    assert_eq!(h.engine.http.get(second.id).await.unwrap().path, "/web");
    assert!(h.runner.calls().is_empty());
}

use ember_lib::game::versions::{Resolution, VersionResolver};
use ember_lib::{LauncherConfig, LauncherError, LocalStore};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolver_for(tmp: &TempDir, catalog_url: Option<String>) -> Arc<VersionResolver> {
    let mut config = LauncherConfig::new(tmp.path().to_path_buf());
    if let Some(url) = catalog_url {
        config.catalog_url = url;
    }
    let config = Arc::new(config);
    let store = Arc::new(LocalStore::new(tmp.path().to_path_buf()));
    Arc::new(VersionResolver::new(
        store,
        reqwest::Client::new(),
        config,
    ))
}

fn write_descriptor(tmp: &TempDir, id: &str, body: &serde_json::Value) {
    let dir = tmp.path().join("versions").join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(format!("{}.json", id)),
        serde_json::to_vec_pretty(body).unwrap(),
    )
    .unwrap();
}

fn library_json(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "downloads": {
            "artifact": {
                "path": format!("{}.jar", name),
                "url": format!("https://libs.example/{}.jar", name),
                "sha1": "da39a3ee5e6b4b0d3255bfef95601890afd80709",
                "size": 1
            }
        }
    })
}

#[tokio::test]
async fn child_and_parent_merge_in_order() {
    let tmp = TempDir::new().unwrap();

    write_descriptor(
        &tmp,
        "1.20-common",
        &serde_json::json!({
            "id": "1.20-common",
            "type": "release",
            "mainClass": "net.game.client.Main",
            "libraries": [library_json("p0"), library_json("p1"), library_json("p2")]
        }),
    );
    write_descriptor(
        &tmp,
        "1.20",
        &serde_json::json!({
            "id": "1.20",
            "inheritsFrom": "1.20-common",
            "libraries": [library_json("c0"), library_json("c1")]
        }),
    );

    let resolver = resolver_for(&tmp, None);
    let descriptor = resolver
        .resolve("1.20", false)
        .await
        .unwrap()
        .ready()
        .expect("descriptor should resolve from local store");

    assert_eq!(descriptor.id, "1.20");
    assert_eq!(descriptor.inherits_from.as_deref(), Some("1.20-common"));
    assert_eq!(descriptor.main_class.as_deref(), Some("net.game.client.Main"));

    let names: Vec<&str> = descriptor
        .libraries
        .iter()
        .map(|l| l.name.as_str())
        .collect();
    assert_eq!(names, vec!["c0", "c1", "p0", "p1", "p2"]);
}

fn write_chain(tmp: &TempDir, descriptors: usize) -> String {
    // d0 inherits d1 inherits ... inherits d{n-1}; n-1 inheritance edges.
    for i in 0..descriptors {
        let id = format!("d{}", i);
        let mut body = serde_json::json!({ "id": id });
        if i + 1 < descriptors {
            body["inheritsFrom"] = serde_json::json!(format!("d{}", i + 1));
        }
        write_descriptor(tmp, &id, &body);
    }
    "d0".to_string()
}

#[tokio::test]
async fn chain_of_nineteen_edges_resolves() {
    let tmp = TempDir::new().unwrap();
    let head = write_chain(&tmp, 20);

    let resolver = resolver_for(&tmp, None);
    let resolution = resolver.resolve(&head, false).await.unwrap();
    assert!(resolution.ready().is_some());
}

#[tokio::test]
async fn chain_of_twenty_edges_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let head = write_chain(&tmp, 21);

    let resolver = resolver_for(&tmp, None);
    let err = resolver.resolve(&head, false).await.unwrap_err();
    assert!(matches!(
        err,
        LauncherError::InheritanceDepthExceeded { .. }
    ));
}

#[tokio::test]
async fn inheritance_cycle_is_fatal() {
    let tmp = TempDir::new().unwrap();
    write_descriptor(
        &tmp,
        "a",
        &serde_json::json!({"id": "a", "inheritsFrom": "b"}),
    );
    write_descriptor(
        &tmp,
        "b",
        &serde_json::json!({"id": "b", "inheritsFrom": "a"}),
    );

    let resolver = resolver_for(&tmp, None);
    let err = resolver.resolve("a", false).await.unwrap_err();
    assert!(matches!(
        err,
        LauncherError::InheritanceDepthExceeded { .. }
    ));
}

#[tokio::test]
async fn missing_descriptor_is_not_cached_sentinel() {
    let tmp = TempDir::new().unwrap();
    let resolver = resolver_for(&tmp, None);

    // Fetch declined by the caller.
    let resolution = resolver.resolve("1.99", false).await.unwrap();
    assert!(matches!(resolution, Resolution::NotCached));

    // Fetch allowed, but the catalog has no entry for the id.
    let resolution = resolver.resolve("1.99", true).await.unwrap();
    assert!(matches!(resolution, Resolution::NotCached));
}

#[tokio::test]
async fn parent_missing_offline_makes_child_not_cached() {
    let tmp = TempDir::new().unwrap();
    write_descriptor(
        &tmp,
        "mod-pack",
        &serde_json::json!({"id": "mod-pack", "inheritsFrom": "1.20"}),
    );

    let resolver = resolver_for(&tmp, None);
    let resolution = resolver.resolve("mod-pack", false).await.unwrap();
    assert!(matches!(resolution, Resolution::NotCached));
}

#[tokio::test]
async fn catalog_refresh_fetches_descriptors_on_demand() {
    let tmp = TempDir::new().unwrap();
    let server = MockServer::start().await;

    let descriptor = serde_json::json!({
        "id": "1.20",
        "type": "release",
        "mainClass": "net.game.client.Main"
    });

    Mock::given(method("GET"))
        .and(path("/catalog.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "versions": { "1.20": format!("{}/1.20.json", server.uri()) }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1.20.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(descriptor))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = resolver_for(&tmp, Some(format!("{}/catalog.json", server.uri())));
    resolver.refresh_catalog().await.unwrap();
    assert_eq!(resolver.version_ids(), vec!["1.20".to_string()]);

    let resolved = resolver.resolve("1.20", true).await.unwrap();
    assert!(resolved.ready().is_some());

    // The fetched descriptor is now durable in the store.
    assert!(tmp.path().join("versions/1.20/1.20.json").exists());
}

#[tokio::test]
async fn failed_refresh_retains_previous_catalog() {
    let tmp = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/catalog.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "versions": { "1.20": "https://meta.example/1.20.json" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = resolver_for(&tmp, Some(format!("{}/catalog.json", server.uri())));
    resolver.refresh_catalog().await.unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/catalog.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = resolver.refresh_catalog().await.unwrap_err();
    assert!(matches!(err, LauncherError::CatalogFetch { .. }));

    // The previous catalog is still intact.
    assert_eq!(resolver.version_ids(), vec!["1.20".to_string()]);
}

#[tokio::test]
async fn effective_runtime_major_substitutes_unsupported() {
    let tmp = TempDir::new().unwrap();

    write_descriptor(
        &tmp,
        "modern",
        &serde_json::json!({"id": "modern", "javaVersion": {"majorVersion": 17}}),
    );
    write_descriptor(
        &tmp,
        "odd",
        &serde_json::json!({"id": "odd", "javaVersion": {"majorVersion": 13}}),
    );
    write_descriptor(&tmp, "legacy", &serde_json::json!({"id": "legacy"}));

    let resolver = resolver_for(&tmp, None);
    assert_eq!(
        resolver.effective_runtime_major("modern").await.unwrap(),
        Some(17)
    );
    // Unsupported majors silently substitute the configured default.
    assert_eq!(
        resolver.effective_runtime_major("odd").await.unwrap(),
        Some(ember_lib::game::config::DEFAULT_RUNTIME_MAJOR)
    );
    assert_eq!(
        resolver.effective_runtime_major("legacy").await.unwrap(),
        Some(ember_lib::game::config::DEFAULT_RUNTIME_MAJOR)
    );
    // Unknown ids are a sentinel, not an error.
    assert_eq!(resolver.effective_runtime_major("nope").await.unwrap(), None);
}

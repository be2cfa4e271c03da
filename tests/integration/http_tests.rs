//! End-to-end runs over HTTP against wiremock servers

use crate::common::{test_engine, RecordingSink, StubAdapter};
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use sumi_harvest::config::{load_config_with_hash, UserAgentConfig};
use sumi_harvest::crawler::{root_tasks, HttpTransport};
use sumi_harvest::output::sink_from_config;
use sumi_harvest::storage::{RunStatus, SqliteStorage, Storage};
use sumi_harvest::{Coordinator, EngineConfig, Task};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html")
}

fn test_user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestHarvester".to_string(),
        crawler_version: "1.0".to_string(),
        contact_url: "https://example.com/about".to_string(),
        contact_email: "admin@example.com".to_string(),
    }
}

fn product_page(article: &str, name: &str, price: &str) -> String {
    format!(
        r#"<html><body>
        <h1>{}</h1>
        <table><tr><td class="article">{}</td></tr></table>
        <span class="price">{}</span>
        </body></html>"#,
        name, article, price
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(html(&body))
        .mount(server)
        .await;
}

fn http_coordinator(
    respect_robots: bool,
    mut engine: EngineConfig,
    sink: Arc<RecordingSink>,
) -> Coordinator {
    engine.respect_robots = respect_robots;
    let transport = HttpTransport::new(&test_user_agent(), &engine).unwrap();
    Coordinator::new(engine, Arc::new(transport), Arc::new(StubAdapter), sink)
}

#[tokio::test]
async fn test_full_harvest_into_sqlite() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&server)
        .await;

    let pagination = r#"<ul class="pagination">
        <li><a href="/brands/acme.html?page=0">1</a></li>
        <li><a href="/brands/acme.html?page=1">2</a></li>
    </ul>"#;

    Mock::given(method("GET"))
        .and(path("/brands/acme.html"))
        .and(query_param("page", "0"))
        .respond_with(html(&format!(
            r#"<html><body><table>
            <tr><td class="description"><a href="/products/a">A</a></td></tr>
            <tr><td class="description"><a href="/products/b">B</a></td></tr>
            </table>{}</body></html>"#,
            pagination
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/brands/acme.html"))
        .and(query_param("page", "1"))
        .respond_with(html(&format!(
            r#"<html><body><table>
            <tr><td class="description"><a href="/products/c">C</a></td></tr>
            <tr><td class="description"><a href="/products/kit">Kit</a></td></tr>
            </table>{}</body></html>"#,
            pagination
        )))
        .mount(&server)
        .await;

    mount_page(&server, "/products/a", product_page("A-100", "Beaker", "$1,250.00")).await;
    mount_page(&server, "/products/b", product_page("B-200", "Flask", "$12.50")).await;
    mount_page(&server, "/products/c", product_page("C-300", "Funnel", "$3")).await;
    mount_page(&server, "/products/d", product_page("D-400", "Pipette", "$7.25")).await;
    mount_page(
        &server,
        "/products/kit",
        r#"<html><body><div class="products_list">
            <a class="item" href="/products/d">D</a>
            <a class="item" href="/products/a">A</a>
        </div></body></html>"#
            .to_string(),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");
    let report_path = dir.path().join("report.md");
    let config_path = dir.path().join("harvest.toml");

    let toml = format!(
        r#"
[engine]
fetcher-concurrency = 4
extractor-concurrency = 2
queue-capacity = 8
per-task-retries = 1
per-task-timeout-ms = 5000
retry-backoff-ms = 10
max-backoff-ms = 20

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[catalog]
listing-url = "{base}/brands/acme.html?page={{page}}"
first-page = 0

[adapter]
item-links = "td.description a"
pagination = "ul.pagination a"
composite = "div.products_list"
composite-links = "div.products_list a.item"
identity-field = "article"

[adapter.constants]
brand = "ACME"

[[adapter.fields]]
name = "article"
selector = "td.article"
required = true

[[adapter.fields]]
name = "name"
selector = "h1"

[[adapter.fields]]
name = "price"
selector = "span.price"
kind = "number"

[output]
console = false
database-path = "{db}"
summary-path = "{report}"
batch-size = 2
"#,
        base = base,
        db = db_path.display(),
        report = report_path.display()
    );
    let mut file = std::fs::File::create(&config_path).unwrap();
    file.write_all(toml.as_bytes()).unwrap();
    drop(file);

    let (config, hash) = load_config_with_hash(&config_path).unwrap();
    let sink = sink_from_config(&config.output, &hash).unwrap();
    let mut coordinator = Coordinator::from_config(&config, Arc::new(sink)).unwrap();

    let summary = coordinator
        .run(root_tasks(&config.catalog))
        .await
        .unwrap();

    assert_eq!(summary.records_emitted, 4);
    assert_eq!(summary.duplicate_tasks, 1);
    assert_eq!(summary.tasks_failed, 0);
    assert_eq!(summary.tasks_abandoned, 0);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, hash);
    assert_eq!(run.records_emitted, 4);

    let records = storage.get_records(run.id).unwrap();
    let mut identities: Vec<&str> = records.iter().map(|r| r.identity.as_str()).collect();
    identities.sort();
    assert_eq!(identities, vec!["A-100", "B-200", "C-300", "D-400"]);

    let beaker = records.iter().find(|r| r.identity == "A-100").unwrap();
    assert_eq!(beaker.field("price"), Some(&Value::from(1250.0)));
    assert_eq!(beaker.field("name"), Some(&Value::from("Beaker")));
    assert_eq!(beaker.field("brand"), Some(&Value::from("ACME")));

    let report = std::fs::read_to_string(&report_path).unwrap();
    assert!(report.contains("- **Records Emitted**: 4"));
}

#[tokio::test]
async fn test_server_error_is_retried_then_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = http_coordinator(false, test_engine(1, 1, 4).with_retries(2), sink.clone());

    let summary = coordinator
        .run(vec![Task::item(format!("{}/products/flaky", server.uri()))])
        .await
        .unwrap();

    assert_eq!(sink.len(), 0);
    assert_eq!(summary.tasks_failed, 1);
    assert_eq!(summary.failures[0].error_kind, "transient");
    assert_eq!(summary.failures[0].attempts, 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = http_coordinator(false, test_engine(1, 1, 4).with_retries(3), sink);

    let summary = coordinator
        .run(vec![Task::item(format!("{}/products/gone", server.uri()))])
        .await
        .unwrap();

    assert_eq!(summary.tasks_failed, 1);
    assert_eq!(summary.failures[0].error_kind, "permanent");
    assert!(summary.failures[0].message.contains("404"));
}

#[tokio::test]
async fn test_non_html_content_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = http_coordinator(false, test_engine(1, 1, 4), sink);

    let summary = coordinator
        .run(vec![Task::item(format!("{}/products/feed", server.uri()))])
        .await
        .unwrap();

    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].error_kind, "permanent");
}

#[tokio::test]
async fn test_robots_denial_fails_task_without_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/item"))
        .respond_with(html("record secret"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/public/item"))
        .respond_with(html("record open"))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let mut coordinator = http_coordinator(true, test_engine(1, 1, 4), sink.clone());

    let summary = coordinator
        .run(vec![
            Task::item(format!("{}/private/item", server.uri())),
            Task::item(format!("{}/public/item", server.uri())),
        ])
        .await
        .unwrap();

    assert_eq!(sink.identities(), vec!["open"]);
    assert_eq!(summary.tasks_failed, 1);
    assert_eq!(summary.failures[0].error_kind, "permanent");
    assert!(summary.failures[0].message.contains("robots"));
}

//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock storefronts and run the full
//! discover, fetch, extract, download and export cycle end-to-end.

use mason_harvest::checkpoint::{CheckpointStore, SourceMode};
use mason_harvest::config::{Config, CrawlerConfig, Discovery, OutputConfig};
use mason_harvest::crawler::{Coordinator, CrawlOutcome};
use mason_harvest::output::{JsonExporter, ProductExporter};
use mason_harvest::product::{ProductRecord, ProductSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Creates a test configuration pointed at the mock server with no pacing
fn create_test_config(server: &MockServer, temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.target.base_url = server.uri();
    config.target.discovery = Discovery::Sitemap;
    config.crawler = CrawlerConfig {
        delay_min_ms: 0,
        delay_max_ms: 0,
        error_delay_min_ms: 0,
        error_delay_max_ms: 0,
        break_min_ms: 0,
        break_max_ms: 0,
        ..CrawlerConfig::default()
    };
    config.fetcher.backoff_min_ms = 0;
    config.fetcher.backoff_max_ms = 0;
    config.images.dispatch_delay_ms = 0;
    config.images.pause_min_ms = 0;
    config.images.pause_max_ms = 0;
    config.images.variant_sizes = Vec::new();
    config.output = OutputConfig {
        output_dir: temp.path().join("out").to_string_lossy().into_owned(),
        log_dir: temp.path().join("logs").to_string_lossy().into_owned(),
    };
    config
}

fn product_page(id: &str) -> String {
    format!(
        r#"<html><body>
        <h2 class="title-detail">Product {id}</h2>
        <span class="current-price">$1,234.50</span>
        <div class="number-items-available">In Stock</div>
        <div class="detail-gallery"><img src="/storage/products/{id}.jpg"></div>
        </body></html>"#
    )
}

fn sitemap(base: &str, ids: &[String]) -> String {
    let locs: String = ids
        .iter()
        .map(|id| format!("<url><loc>{}/products/{}</loc></url>\n", base, id))
        .collect();
    format!(r#"<?xml version="1.0"?><urlset>{}</urlset>"#, locs)
}

fn ids(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("p{}", i)).collect()
}

/// Serves a product page for any `/products/<id>`, optionally cancelling a
/// token once a given number of pages has been served
struct ProductPages {
    served: Arc<AtomicUsize>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl ProductPages {
    fn new() -> Self {
        Self {
            served: Arc::new(AtomicUsize::new(0)),
            cancel_after: None,
        }
    }
}

impl Respond for ProductPages {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let served = self.served.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.cancel_after {
            if served == *limit {
                token.cancel();
            }
        }
        let id = request.url.path().rsplit('/').next().unwrap_or_default();
        ResponseTemplate::new(200).set_body_string(product_page(id))
    }
}

async fn mount_sitemap(server: &MockServer, product_ids: &[String]) {
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap(&server.uri(), product_ids)))
        .mount(server)
        .await;
}

async fn mount_product_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/products/[^/]+$"))
        .respond_with(ProductPages::new())
        .mount(server)
        .await;
}

fn listing_card(id: &str) -> String {
    format!(
        r#"<div class="product-card">
             <a href="/products/{id}"><h3>Card {id}</h3></a>
             <span class="price">$10.00</span>
             <span class="category">Lighting</span>
           </div>"#
    )
}

/// Mounts `/products?page=N` for each group of ids, plus an unpaged listing
/// whose pagination links reach the last page
async fn mount_listing(server: &MockServer, pages: &[&[&str]]) {
    for (index, page_ids) in pages.iter().enumerate() {
        let cards: String = page_ids.iter().map(|id| listing_card(id)).collect();
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("page", (index + 1).to_string()))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(format!("<html>{}</html>", cards)),
            )
            .mount(server)
            .await;
    }
    let links: String = (2..=pages.len())
        .map(|page| format!(r#"<li><a href="/products?page={page}">{page}</a></li>"#))
        .collect();
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(r#"<ul class="pagination">{}</ul>"#, links)),
        )
        .mount(server)
        .await;
}

fn load_products(config: &Config) -> ProductSet {
    ProductSet::load_json(&config.output.json_path()).unwrap()
}

fn csv_rows(config: &Config) -> usize {
    let mut reader = csv::Reader::from_path(config.output.csv_path()).unwrap();
    reader.records().count()
}

#[tokio::test]
async fn test_sitemap_crawl_exports_all_products() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = create_test_config(&server, &temp);

    mount_sitemap(&server, &ids(3)).await;
    mount_product_pages(&server).await;

    let mut coordinator = Coordinator::new(config.clone(), false).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.summary.products, 3);
    assert_eq!(report.summary.errors, 0);

    let products = load_products(&config);
    let exported: Vec<&str> = products.ids().collect();
    assert_eq!(exported, vec!["p1", "p2", "p3"]);

    let first = products.get("p1").unwrap();
    assert_eq!(first.name.as_deref(), Some("Product p1"));
    assert_eq!(first.price, Some(1234.5));
    assert_eq!(first.in_stock, Some(true));
    assert_eq!(
        first.image_urls,
        vec![format!("{}/storage/products/p1.jpg", server.uri())]
    );

    assert_eq!(csv_rows(&config), 3);
    assert!(!config.output.checkpoint_path().exists());
}

#[tokio::test]
async fn test_resume_fetches_only_the_complement() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = create_test_config(&server, &temp);
    std::fs::create_dir_all(&config.output.output_dir).unwrap();

    let done: Vec<ProductRecord> = ["p1", "p2"]
        .iter()
        .map(|id| {
            let mut record =
                ProductRecord::new(*id, format!("{}/products/{}", server.uri(), id));
            record.name = Some(format!("Earlier {}", id));
            record
        })
        .collect();
    CheckpointStore::new(config.output.checkpoint_path())
        .save(SourceMode::Sitemap, 2, &done)
        .unwrap();
    JsonExporter::new(config.output.json_path()).export(&done).unwrap();

    mount_sitemap(&server, &ids(5)).await;
    for id in ["p1", "p2"] {
        Mock::given(method("GET"))
            .and(path(format!("/products/{}", id)))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
    }
    for id in ["p3", "p4", "p5"] {
        Mock::given(method("GET"))
            .and(path(format!("/products/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_string(product_page(id)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut coordinator = Coordinator::new(config.clone(), true).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.summary.processed, 3);

    let products = load_products(&config);
    let exported: Vec<&str> = products.ids().collect();
    assert_eq!(exported, vec!["p1", "p2", "p3", "p4", "p5"]);
    assert_eq!(products.get("p1").unwrap().name.as_deref(), Some("Earlier p1"));
    assert_eq!(products.get("p4").unwrap().name.as_deref(), Some("Product p4"));
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = create_test_config(&server, &temp);

    mount_sitemap(&server, &ids(1)).await;
    Mock::given(method("GET"))
        .and(path("/products/p1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("p1")))
        .expect(1)
        .mount(&server)
        .await;

    let mut coordinator = Coordinator::new(config.clone(), false).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.summary.products, 1);
    assert_eq!(report.summary.errors, 0);
    assert!(load_products(&config).contains("p1"));
}

#[tokio::test]
async fn test_exhausted_item_is_skipped() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = create_test_config(&server, &temp);

    mount_sitemap(&server, &ids(2)).await;
    Mock::given(method("GET"))
        .and(path("/products/p1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    mount_product_pages(&server).await;

    let mut coordinator = Coordinator::new(config.clone(), false).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.summary.errors, 1);

    let products = load_products(&config);
    let exported: Vec<&str> = products.ids().collect();
    assert_eq!(exported, vec!["p2"]);
}

#[tokio::test]
async fn test_interrupt_saves_partial_progress() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = create_test_config(&server, &temp);
    let token = CancellationToken::new();

    mount_sitemap(&server, &ids(100)).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/products/[^/]+$"))
        .respond_with(ProductPages {
            served: Arc::new(AtomicUsize::new(0)),
            cancel_after: Some((30, token.clone())),
        })
        .expect(30)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 16]))
        .expect(0)
        .mount(&server)
        .await;

    let mut coordinator = Coordinator::with_cancellation(config.clone(), false, token).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Interrupted);
    assert!(report.summary.interrupted);

    let state = CheckpointStore::new(config.output.checkpoint_path()).load();
    assert_eq!(state.completed_ids.len(), 30);
    assert_eq!(state.completed_ids[0], "p1");
    assert_eq!(state.completed_ids[29], "p30");

    assert_eq!(load_products(&config).len(), 30);
    assert_eq!(csv_rows(&config), 30);
}

#[tokio::test]
async fn test_listing_mode_seeds_from_cards() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let mut config = create_test_config(&server, &temp);
    config.target.discovery = Discovery::Listing;

    mount_listing(&server, &[&["lamp", "sconce"], &["bulb"]]).await;

    let page_two = format!("{}/products?page=2", server.uri());
    Mock::given(method("GET"))
        .and(path("/products/bulb"))
        .and(header("referer", page_two.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("bulb")))
        .expect(1)
        .mount(&server)
        .await;
    mount_product_pages(&server).await;

    let mut coordinator = Coordinator::new(config.clone(), false).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);

    let products = load_products(&config);
    let exported: Vec<&str> = products.ids().collect();
    assert_eq!(exported, vec!["lamp", "sconce", "bulb"]);

    let lamp = products.get("lamp").unwrap();
    assert_eq!(lamp.name.as_deref(), Some("Product lamp"));
    assert_eq!(lamp.category.as_deref(), Some("Lighting"));
    assert_eq!(lamp.price, Some(1234.5));
}

#[tokio::test]
async fn test_image_download_is_idempotent() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let mut config = create_test_config(&server, &temp);
    config.images.variant_sizes = vec!["800x800".to_string()];

    mount_sitemap(&server, &ids(1)).await;
    mount_product_pages(&server).await;
    Mock::given(method("HEAD"))
        .and(path("/storage/products/p1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/products/p1.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64]))
        .expect(1)
        .mount(&server)
        .await;

    let first = Coordinator::new(config.clone(), false)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.summary.images.downloaded, 1);
    assert_eq!(first.summary.images.unavailable, 1);

    let first_images = load_products(&config).get("p1").unwrap().local_images.clone();
    assert_eq!(first_images.len(), 1);
    assert!(first_images[0].ends_with("p1_1_original.jpg"));
    assert_eq!(std::fs::read(&first_images[0]).unwrap().len(), 64);

    server.verify().await;
    server.reset().await;

    mount_sitemap(&server, &ids(1)).await;
    mount_product_pages(&server).await;
    Mock::given(method("GET"))
        .and(path("/storage/products/p1.jpg"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/storage/products/p1.jpg"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let second = Coordinator::new(config.clone(), false)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(second.summary.images.downloaded, 0);
    assert_eq!(second.summary.images.already_present, 1);
    assert_eq!(
        load_products(&config).get("p1").unwrap().local_images,
        first_images
    );
}

#[tokio::test]
async fn test_sitemap_checkpoint_does_not_skip_listing_pages() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let mut config = create_test_config(&server, &temp);
    config.target.discovery = Discovery::Auto;
    std::fs::create_dir_all(&config.output.output_dir).unwrap();

    let done = vec![ProductRecord::new("p1", format!("{}/products/p1", server.uri()))];
    CheckpointStore::new(config.output.checkpoint_path())
        .save(SourceMode::Sitemap, 1, &done)
        .unwrap();
    JsonExporter::new(config.output.json_path()).export(&done).unwrap();

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_listing(&server, &[&["p1", "p2"], &["p3"]]).await;
    Mock::given(method("GET"))
        .and(path("/products/p1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    for id in ["p2", "p3"] {
        Mock::given(method("GET"))
            .and(path(format!("/products/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_string(product_page(id)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut coordinator = Coordinator::new(config.clone(), true).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.summary.processed, 2);

    let products = load_products(&config);
    let exported: Vec<&str> = products.ids().collect();
    assert_eq!(exported, vec!["p1", "p2", "p3"]);
}

#[tokio::test]
async fn test_listing_checkpoint_resumes_after_last_page() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let mut config = create_test_config(&server, &temp);
    config.target.discovery = Discovery::Listing;
    std::fs::create_dir_all(&config.output.output_dir).unwrap();

    let done: Vec<ProductRecord> = ["p1", "p2"]
        .iter()
        .map(|id| ProductRecord::new(*id, format!("{}/products/{}", server.uri(), id)))
        .collect();
    CheckpointStore::new(config.output.checkpoint_path())
        .save(SourceMode::Listing, 1, &done)
        .unwrap();
    JsonExporter::new(config.output.json_path()).export(&done).unwrap();

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mount_listing(&server, &[&["p1", "p2"], &["p3"]]).await;
    Mock::given(method("GET"))
        .and(path("/products/p3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page("p3")))
        .expect(1)
        .mount(&server)
        .await;

    let mut coordinator = Coordinator::new(config.clone(), true).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.summary.processed, 1);
    assert_eq!(load_products(&config).len(), 3);
}

/// Records the user agent each product page was requested with
struct AgentLog {
    agents: Arc<Mutex<Vec<(String, String)>>>,
}

impl Respond for AgentLog {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id = request.url.path().rsplit('/').next().unwrap_or_default().to_string();
        let agent = request
            .headers
            .iter()
            .find(|(name, _)| name.as_str().eq_ignore_ascii_case("user-agent"))
            .map(|(_, values)| values.last().as_str().to_string())
            .unwrap_or_default();
        self.agents.lock().unwrap().push((id.clone(), agent));
        ResponseTemplate::new(200).set_body_string(product_page(&id))
    }
}

#[tokio::test]
async fn test_break_rotates_identity() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let mut config = create_test_config(&server, &temp);
    config.crawler.break_interval = 2;
    config.fetcher.rotate_every = 1000;

    let agents = Arc::new(Mutex::new(Vec::new()));
    mount_sitemap(&server, &ids(4)).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/products/[^/]+$"))
        .respond_with(AgentLog {
            agents: agents.clone(),
        })
        .expect(4)
        .mount(&server)
        .await;

    let report = Coordinator::new(config.clone(), false)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.summary.products, 4);

    let agents = agents.lock().unwrap().clone();
    let order: Vec<&str> = agents.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(order, vec!["p1", "p2", "p3", "p4"]);
    assert!(!agents[0].1.is_empty());
    assert_eq!(agents[0].1, agents[1].1);
    assert_ne!(agents[1].1, agents[2].1);
    assert_eq!(agents[2].1, agents[3].1);
}

/// Snapshot of the on-disk checkpoint and export sizes
type Snapshot = Arc<Mutex<Option<(usize, usize, Option<SourceMode>)>>>;

/// Serves product pages and, on the request after `after` pages, captures
/// what the checkpoint and JSON export hold at that moment
struct MidRunSnapshot {
    served: AtomicUsize,
    after: usize,
    checkpoint: PathBuf,
    export: PathBuf,
    snapshot: Snapshot,
}

impl Respond for MidRunSnapshot {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let served = self.served.fetch_add(1, Ordering::SeqCst);
        if served == self.after {
            let state = CheckpointStore::new(&self.checkpoint).load();
            let exported = ProductSet::load_json(&self.export).map_or(0, |products| products.len());
            *self.snapshot.lock().unwrap() = Some((state.completed_ids.len(), exported, state.mode));
        }
        let id = request.url.path().rsplit('/').next().unwrap_or_default();
        ResponseTemplate::new(200).set_body_string(product_page(id))
    }
}

#[tokio::test]
async fn test_checkpoint_written_during_run() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = create_test_config(&server, &temp);
    assert_eq!(config.crawler.checkpoint_interval, 25);

    let snapshot: Snapshot = Arc::new(Mutex::new(None));
    mount_sitemap(&server, &ids(30)).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/products/[^/]+$"))
        .respond_with(MidRunSnapshot {
            served: AtomicUsize::new(0),
            after: 25,
            checkpoint: config.output.checkpoint_path(),
            export: config.output.json_path(),
            snapshot: snapshot.clone(),
        })
        .expect(30)
        .mount(&server)
        .await;

    let report = Coordinator::new(config.clone(), false)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.outcome, CrawlOutcome::Completed);

    let taken = *snapshot.lock().unwrap();
    assert_eq!(taken, Some((25, 25, Some(SourceMode::Sitemap))));
    assert!(!config.output.checkpoint_path().exists());
}

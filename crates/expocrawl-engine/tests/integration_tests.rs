//! End-to-end crawl tests against the mock platform
//!
//! ```bash
//! cargo test -p expocrawl-engine --test integration_tests
//! ```

mod fixtures;

use expocrawl_core::{
    DashboardRef, DashboardState, FetchErrorPolicy, OutputConfig, OutputFormat, Relation,
    SqlSourceKind,
};
use expocrawl_dbt::{ExposureStore, Manifest, ManifestStore, PropertiesFile};
use expocrawl_engine::{BuildOptions, CrawlError, Crawler, ExclusionPolicy};
use expocrawl_platform::{FetchError, MockPlatformBuilder};
use fixtures::{alice, bob, reference, workbook, SHOP_MANIFEST};
use pretty_assertions::assert_eq;

// =============================================================================
// Helper Functions
// =============================================================================

fn orders_only() -> Vec<Relation> {
    vec![Relation::model("m1", "ANALYTICS", "MARTS", "orders")]
}

fn options() -> BuildOptions {
    let mut options = BuildOptions::new("shop");
    options.max_concurrent_requests = 4;
    options
}

// =============================================================================
// Lineage scenarios
// =============================================================================

#[tokio::test]
async fn test_dashboard_with_project_is_exposed() {
    let dash_a = workbook("dash_A", "Sales Overview", "Sales", "u-alice");
    let platform = MockPlatformBuilder::new()
        .with_snippet(SqlSourceKind::Custom, reference(&dash_a), "select * from orders")
        .with_dashboard(dash_a)
        .with_owner(alice())
        .build();

    let outcome = Crawler::new(&platform, options())
        .crawl(orders_only())
        .await
        .unwrap();

    assert_eq!(outcome.exposures.len(), 1);
    let exposure = &outcome.exposures["dash_A"];
    assert_eq!(exposure.depends_on.nodes, vec!["m1"]);
    assert_eq!(exposure.owner.name, "alice");
    assert_eq!(exposure.owner.email.as_deref(), Some("alice@example.com"));
    assert_eq!(exposure.dashboard_id(), Some("dash_A"));
}

#[tokio::test]
async fn test_personal_space_dashboard_is_matched_but_not_exposed() {
    let dash_b = workbook("dash_B", "Scratch", "", "u-alice");
    let platform = MockPlatformBuilder::new()
        .with_snippet(SqlSourceKind::Custom, reference(&dash_b), "select * from orders")
        .with_dashboard(dash_b)
        .with_owner(alice())
        .build();

    let outcome = Crawler::new(&platform, options())
        .crawl(orders_only())
        .await
        .unwrap();

    assert_eq!(outcome.summary.matched_dashboards, 1);
    assert!(outcome.exposures.is_empty());
    assert_eq!(outcome.dashboards[0].state(), DashboardState::Excluded);
    assert_eq!(platform.owner_calls(), 0);
}

#[tokio::test]
async fn test_relation_found_in_both_sources_is_listed_once() {
    let dash_c = workbook("dash_C", "Ops", "Operations", "u-bob");
    let platform = MockPlatformBuilder::new()
        .with_snippet(SqlSourceKind::Custom, reference(&dash_c), "select * from orders")
        .with_snippet(
            SqlSourceKind::Native,
            reference(&dash_c),
            "select * from ANALYTICS.MARTS.ORDERS",
        )
        .with_dashboard(dash_c)
        .with_owner(bob())
        .build();

    let outcome = Crawler::new(&platform, options())
        .crawl(orders_only())
        .await
        .unwrap();

    assert_eq!(outcome.summary.custom_sql_matches, 1);
    assert_eq!(outcome.summary.native_sql_matches, 1);
    assert_eq!(outcome.summary.matched_dashboards, 1);

    let exposure = &outcome.exposures["dash_C"];
    assert_eq!(exposure.depends_on.nodes, vec!["m1"]);
    assert_eq!(exposure.owner.name, "Bob Stone");
}

#[tokio::test]
async fn test_ignored_projects_and_unmatched_dashboards() {
    let kept = workbook("wb-1", "Revenue", "Finance", "u-alice");
    let ignored = workbook("wb-2", "Old Revenue", "Archive", "u-alice");
    let unmatched = workbook("wb-3", "Marketing", "Marketing", "u-alice");

    let platform = MockPlatformBuilder::new()
        .with_snippet(SqlSourceKind::Custom, reference(&kept), "select * from orders")
        .with_snippet(SqlSourceKind::Custom, reference(&ignored), "select * from orders")
        .with_snippet(SqlSourceKind::Custom, reference(&unmatched), "select * from preorders")
        .with_dashboard(kept)
        .with_dashboard(ignored)
        .with_dashboard(unmatched)
        .with_owner(alice())
        .build();

    let mut options = options();
    options.exclusion = ExclusionPolicy::new(vec!["Archive".to_string()]);

    let outcome = Crawler::new(&platform, options)
        .crawl(orders_only())
        .await
        .unwrap();

    let ids: Vec<&str> = outcome.exposures.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["wb-1"]);
    assert_eq!(outcome.summary.excluded, 1);
    // wb-3 never matched, so its metadata is never fetched
    assert_eq!(platform.dashboard_calls(), 2);
}

// =============================================================================
// Failure handling
// =============================================================================

#[tokio::test]
async fn test_failed_dashboard_does_not_affect_others() {
    let broken = workbook("wb-1", "Broken", "Finance", "u-alice");
    let healthy = workbook("wb-2", "Healthy", "Finance", "u-alice");

    let platform = MockPlatformBuilder::new()
        .with_snippet(SqlSourceKind::Custom, reference(&broken), "select * from orders")
        .with_snippet(SqlSourceKind::Custom, reference(&healthy), "select * from orders")
        .with_dashboard(healthy)
        .with_dashboard_error("wb-1", FetchError::NetworkError("connection reset".to_string()))
        .with_owner(alice())
        .build();

    let outcome = Crawler::new(&platform, options())
        .crawl(orders_only())
        .await
        .unwrap();

    assert_eq!(outcome.summary.failed, 1);
    assert_eq!(outcome.summary.exposed, 1);
    assert!(outcome.exposures.contains_key("wb-2"));

    let report = outcome.report();
    assert!(report.has_failures());
    assert_eq!(report.dashboards[0].state, DashboardState::Failed);
    assert_eq!(report.dashboards[1].state, DashboardState::Exposed);
    assert_eq!(report.summary.relations, 1);
}

#[tokio::test]
async fn test_abort_policy_fails_the_run() {
    let broken = workbook("wb-1", "Broken", "Finance", "u-alice");
    let platform = MockPlatformBuilder::new()
        .with_snippet(SqlSourceKind::Custom, reference(&broken), "select * from orders")
        .with_dashboard_error("wb-1", FetchError::NotFound("wb-1".to_string()))
        .build();

    let mut options = options();
    options.on_fetch_error = FetchErrorPolicy::Abort;

    let result = Crawler::new(&platform, options).crawl(orders_only()).await;
    match result {
        Err(CrawlError::Fetch(aborted)) => {
            assert_eq!(aborted.dashboard, DashboardRef::new("wb-1", ""))
        }
        other => panic!("expected an aborted fetch, got {:?}", other.map(|o| o.summary)),
    }
}

#[tokio::test]
async fn test_extraction_failure_fails_the_run() {
    let platform = MockPlatformBuilder::new()
        .with_extraction_error(
            SqlSourceKind::Native,
            FetchError::AuthenticationError("session expired".to_string()),
        )
        .build();

    let result = Crawler::new(&platform, options()).crawl(orders_only()).await;
    assert!(matches!(
        result,
        Err(CrawlError::Extraction {
            kind: SqlSourceKind::Native,
            ..
        })
    ));
}

#[tokio::test]
async fn test_incomplete_relation_fails_before_matching() {
    let platform = MockPlatformBuilder::new().build();
    let mut relation = Relation::model("m1", "ANALYTICS", "MARTS", "orders");
    relation.database = String::new();

    let result = Crawler::new(&platform, options()).crawl(vec![relation]).await;
    assert!(matches!(result, Err(CrawlError::Registry(_))));
    assert_eq!(platform.dashboard_calls(), 0);
}

// =============================================================================
// Manifest round trip
// =============================================================================

fn shop_platform() -> expocrawl_platform::MockPlatform {
    let revenue = workbook("3f2a9c1e-77aa-4b1c", "Revenue", "Finance", "u-alice");
    MockPlatformBuilder::new()
        .with_name("Tableau")
        .with_snippet(
            SqlSourceKind::Custom,
            reference(&revenue),
            r#"select o.*, p.amount
               from "ANALYTICS"."MARTS"."ORDERS" o
               join raw.stripe.payments p on p.order_id = o.id"#,
        )
        .with_snippet(
            SqlSourceKind::Native,
            reference(&revenue),
            "select * from ANALYTICS.MARTS.DIM_CUSTOMERS",
        )
        .with_dashboard(revenue)
        .with_owner(alice())
        .build()
}

#[tokio::test]
async fn test_run_registers_exposures_in_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manifest.json");
    std::fs::write(&path, SHOP_MANIFEST).unwrap();

    let platform = shop_platform();
    let crawler = Crawler::new(&platform, options());

    let mut store = ManifestStore::open(&path, OutputConfig::default()).unwrap();
    let (outcome, written) = crawler.run(&mut store).await.unwrap();
    assert_eq!(written, path);

    let exposure = outcome.exposures.values().next().unwrap();
    assert_eq!(
        exposure.depends_on.nodes,
        vec![
            "model.shop.orders",
            "source.shop.stripe.payments",
            "model.shop.customers"
        ]
    );

    let manifest = Manifest::from_file(&path).unwrap();
    assert_eq!(manifest.exposures.len(), 1);
    assert!(manifest.extra.contains_key("macros"));
    assert_eq!(
        manifest.child_map["model.shop.orders"],
        vec![exposure.unique_id.clone()]
    );
    assert!(!manifest.child_map.contains_key("model.shop.stg_orders"));

    // Second run against the updated manifest replaces instead of duplicating
    let mut store = ManifestStore::open(&path, OutputConfig::default()).unwrap();
    crawler.run(&mut store).await.unwrap();

    let manifest = Manifest::from_file(&path).unwrap();
    assert_eq!(manifest.exposures.len(), 1);
    assert_eq!(
        manifest.child_map["model.shop.orders"],
        vec![exposure.unique_id.clone()]
    );
}

#[tokio::test]
async fn test_run_writes_properties_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("target");
    std::fs::create_dir_all(&target).unwrap();
    let path = target.join("manifest.json");
    std::fs::write(&path, SHOP_MANIFEST).unwrap();

    let platform = shop_platform();
    let output = OutputConfig {
        destination: None,
        format: OutputFormat::Properties,
    };

    let mut store = ManifestStore::open(&path, output).unwrap();
    let (_, written) = Crawler::new(&platform, options())
        .run(&mut store)
        .await
        .unwrap();

    assert_eq!(written, dir.path().join("models/exposures/tableau.yml"));

    let document: PropertiesFile =
        serde_yaml::from_str(&std::fs::read_to_string(&written).unwrap()).unwrap();
    assert_eq!(document.version, 2);
    assert_eq!(
        document.exposures[0].depends_on,
        vec![
            "ref('orders')",
            "ref('customers')",
            "source('stripe', 'payments')"
        ]
    );

    // Properties output leaves the manifest untouched
    let manifest = Manifest::from_file(&path).unwrap();
    assert!(manifest.exposures.is_empty());
    assert_eq!(store.load_relations().unwrap().len(), 4);
}

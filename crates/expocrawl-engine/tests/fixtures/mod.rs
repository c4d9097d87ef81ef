//! Shared fixtures for crawl integration tests
//!
//! A small dbt project (`shop`) with one model per layer and one source, plus
//! helpers to describe Tableau-like workbooks for the mock platform.

use expocrawl_core::{DashboardMetadata, DashboardRef, Owner};

/// manifest.json of the `shop` project
///
/// `orders` is the only model whose warehouse name is plain `orders`;
/// `stg_orders` exists to catch substring matches.
pub const SHOP_MANIFEST: &str = r#"{
    "metadata": {
        "dbt_version": "1.7.4",
        "generated_at": "2024-05-01T08:00:00Z",
        "project_name": "shop"
    },
    "nodes": {
        "model.shop.orders": {
            "unique_id": "model.shop.orders",
            "name": "orders",
            "resource_type": "model",
            "package_name": "shop",
            "database": "ANALYTICS",
            "schema": "MARTS",
            "config": {"enabled": true, "materialized": "table"}
        },
        "model.shop.stg_orders": {
            "unique_id": "model.shop.stg_orders",
            "name": "stg_orders",
            "resource_type": "model",
            "package_name": "shop",
            "database": "ANALYTICS",
            "schema": "STAGING",
            "config": {"enabled": true, "materialized": "view"}
        },
        "model.shop.customers": {
            "unique_id": "model.shop.customers",
            "name": "customers",
            "resource_type": "model",
            "package_name": "shop",
            "database": "ANALYTICS",
            "schema": "MARTS",
            "alias": "dim_customers",
            "config": {"enabled": true, "materialized": "table"}
        },
        "test.shop.not_null_orders_id": {
            "unique_id": "test.shop.not_null_orders_id",
            "name": "not_null_orders_id",
            "resource_type": "test",
            "package_name": "shop",
            "database": "ANALYTICS",
            "schema": "MARTS"
        }
    },
    "sources": {
        "source.shop.stripe.payments": {
            "unique_id": "source.shop.stripe.payments",
            "source_name": "stripe",
            "name": "payments",
            "package_name": "shop",
            "database": "RAW",
            "schema": "STRIPE"
        }
    },
    "exposures": {},
    "parent_map": {},
    "child_map": {},
    "macros": {"macro.shop.cents_to_dollars": {"name": "cents_to_dollars"}}
}"#;

pub fn workbook(id: &str, name: &str, project: &str, owner_id: &str) -> DashboardMetadata {
    DashboardMetadata {
        id: id.to_string(),
        name: name.to_string(),
        project_name: Some(project.to_string()),
        owner_id: owner_id.to_string(),
        url: Some(format!("https://tableau.example.com/#/workbooks/{}", id)),
        description: None,
    }
}

pub fn reference(metadata: &DashboardMetadata) -> DashboardRef {
    metadata.reference()
}

pub fn alice() -> Owner {
    Owner {
        id: "u-alice".to_string(),
        name: "alice".to_string(),
        full_name: None,
        email: Some("alice@example.com".to_string()),
    }
}

pub fn bob() -> Owner {
    Owner {
        id: "u-bob".to_string(),
        name: "bob".to_string(),
        full_name: Some("Bob Stone".to_string()),
        email: None,
    }
}

//! Shared test documents.

use serde_json::{json, Value};

use crate::schema::PlanSchema;

/// A plan admissible under the default manifest and an empty contract.
pub(crate) fn valid_document() -> Value {
    let schema_version = PlanSchema::embedded()
        .map(|s| s.version())
        .unwrap_or_default();
    json!({
        "plan_id": "checkout",
        "project_name": "Checkout Service",
        "schema_version": schema_version,
        "entities": ["backend", "frontend", "orders_db", "identity"],
        "invariants": [
            {"entity": "backend", "predicate_key": "openapi", "value": "v3", "domain": "api_contracts"},
            {"entity": "orders_db", "predicate_key": "orders_table", "value": {"id": "uuid"}, "domain": "data_schemas"},
            {"entity": "backend", "predicate_key": "port", "value": 8080, "domain": "env_vars"},
            {"entity": "frontend", "predicate_key": "node_version", "value": "20", "domain": "build_dependencies"},
            {"entity": "identity", "predicate_key": "provider", "value": "OIDC", "domain": "auth_model"},
            {"entity": "orders_db", "predicate_key": "engine", "value": "postgres", "domain": "persistence_model"}
        ],
        "assumptions": {
            "authentication": "OIDC",
            "authorization": "RBAC",
            "deployment_scope": "single-region",
            "data_retention": "90 days",
            "scaling_model": "horizontal"
        },
        "build_dag": {
            "nodes": ["orders_db", "backend", "frontend"],
            "edges": [["backend", "orders_db"], ["frontend", "backend"]]
        },
        "fields": {
            "repository_url": "https://git.example.com/checkout",
            "module_path": "checkout.api",
            "package_name": "checkout-api"
        }
    })
}

//! Built-in per-industry template packs.
//!
//! Packs are compile-time data keyed by the industry tag: realistic list and
//! detail row shapes plus a starter endpoint set. They serve two callers:
//! the REST trap renders the row shapes directly, and the persona engine
//! falls back to the pack endpoint set when no LLM provider is configured.
//! Placeholders are filled at request time by the interpolator.

use crate::models::{Industry, ResponseTemplate};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Generic prefix used inside pack data; rewritten to the persona's
/// endpoint prefix when templates are registered.
pub const PACK_PREFIX: &str = "/api/v1";

// ─── Industry row shapes ────────────────────────────────────────────────────

/// Rows for list-style responses. Identifiers embed canary placeholders so
/// every emitted id is attributable.
pub fn list_rows(industry: Industry) -> Value {
    match industry {
        Industry::Fintech => json!([
            {
                "id": "txn_{{canary_1}}",
                "amount": 2847.50,
                "currency": "USD",
                "status": "completed",
                "created_at": "{{timestamp}}"
            },
            {
                "id": "txn_{{canary_2}}",
                "amount": 149.99,
                "currency": "USD",
                "status": "pending",
                "created_at": "{{timestamp}}"
            }
        ]),
        Industry::Saas => json!([
            {
                "id": "usr_{{canary_1}}",
                "email": "admin@{{company_domain}}",
                "role": "admin",
                "status": "active"
            },
            {
                "id": "usr_{{canary_2}}",
                "email": "dev@{{company_domain}}",
                "role": "member",
                "status": "active"
            }
        ]),
        Industry::Healthcare => json!([
            {
                "id": "pat_{{canary_1}}",
                "name": "Riley Thompson",
                "mrn": "MRN-{{canary_2}}",
                "status": "active"
            },
            {
                "id": "pat_{{short_id}}",
                "name": "Morgan Lee",
                "mrn": "MRN-{{canary_1}}",
                "status": "active"
            }
        ]),
        Industry::Ecommerce => json!([
            {
                "id": "prod_{{canary_1}}",
                "name": "Wireless Headphones",
                "price": 199.99,
                "in_stock": true,
                "sku": "SKU-{{canary_2}}"
            },
            {
                "id": "prod_{{short_id}}",
                "name": "USB-C Hub",
                "price": 49.99,
                "in_stock": true,
                "sku": "SKU-{{canary_1}}"
            }
        ]),
        Industry::Devtools => json!([
            {
                "id": "repo_{{canary_1}}",
                "name": "api-gateway",
                "language": "TypeScript",
                "visibility": "private"
            },
            {
                "id": "repo_{{canary_2}}",
                "name": "ml-pipeline",
                "language": "Python",
                "visibility": "private"
            }
        ]),
        Industry::Logistics => json!([
            {
                "id": "shp_{{canary_1}}",
                "tracking": "TRK-{{canary_2}}",
                "status": "in_transit",
                "carrier": "FedEx"
            },
            {
                "id": "shp_{{short_id}}",
                "tracking": "TRK-{{canary_1}}",
                "status": "delivered",
                "carrier": "UPS"
            }
        ]),
    }
}

/// Single-resource detail shape. Fabricated network addresses stay inside
/// RFC 1918 ranges and fabricated domains inside reserved TLDs.
pub fn detail_row(industry: Industry) -> Value {
    match industry {
        Industry::Fintech => json!({
            "id": "txn_{{canary_1}}",
            "amount": 2847.50,
            "currency": "USD",
            "status": "completed",
            "merchant": "CloudServices Inc.",
            "reference": "REF-{{canary_2}}",
            "created_at": "{{timestamp}}",
            "metadata": {"source": "api", "ip": "10.0.1.{{octet}}"}
        }),
        Industry::Saas => json!({
            "id": "usr_{{canary_1}}",
            "email": "admin@{{company_domain}}",
            "name": "Alex Chen",
            "role": "admin",
            "status": "active",
            "last_login": "{{timestamp}}",
            "workspace_id": "ws_{{canary_2}}"
        }),
        Industry::Healthcare => json!({
            "id": "pat_{{canary_1}}",
            "name": "Riley Thompson",
            "date_of_birth": "1985-07-22",
            "mrn": "MRN-{{canary_2}}",
            "insurance_id": "INS-{{short_id}}",
            "provider": "Dr. Sarah Kim",
            "last_visit": "{{timestamp}}"
        }),
        Industry::Ecommerce => json!({
            "id": "prod_{{canary_1}}",
            "name": "Wireless Noise-Canceling Headphones",
            "price": 199.99,
            "currency": "USD",
            "sku": "SKU-{{canary_2}}",
            "in_stock": true,
            "rating": 4.7,
            "reviews_count": 342
        }),
        Industry::Devtools => json!({
            "id": "repo_{{canary_1}}",
            "name": "api-gateway",
            "language": "TypeScript",
            "visibility": "private",
            "default_branch": "main",
            "last_push": "{{timestamp}}",
            "clone_url": "git@git.{{company_domain}}:org/api-gateway.git"
        }),
        Industry::Logistics => json!({
            "id": "shp_{{canary_1}}",
            "tracking_number": "TRK-{{canary_2}}",
            "status": "in_transit",
            "carrier": "FedEx",
            "origin": "Memphis, TN",
            "destination": "San Francisco, CA",
            "estimated_delivery": "{{timestamp}}"
        }),
    }
}

/// REST operations advertised for each industry, as `(path, method,
/// summary)` relative to the endpoint prefix. Feeds the OpenAPI builder
/// and the sitemap.
pub fn rest_operations(industry: Industry) -> &'static [(&'static str, &'static str, &'static str)] {
    match industry {
        Industry::Fintech => &[
            ("/transactions", "GET", "List transactions"),
            ("/transactions/{id}", "GET", "Get transaction by ID"),
            ("/accounts", "GET", "List accounts"),
            ("/accounts/{id}", "GET", "Get account details"),
            ("/accounts/{id}/balance", "GET", "Get account balance"),
            ("/transfers", "POST", "Create a transfer"),
            ("/customers/{id}", "GET", "Get customer profile"),
            ("/config", "GET", "Get service configuration"),
        ],
        Industry::Saas => &[
            ("/users", "GET", "List users"),
            ("/users/{id}", "GET", "Get user by ID"),
            ("/workspaces", "GET", "List workspaces"),
            ("/workspaces/{id}", "GET", "Get workspace details"),
            ("/api-keys", "GET", "List API keys"),
            ("/api-keys", "POST", "Create API key"),
            ("/logs", "GET", "Fetch application logs"),
            ("/deployments", "POST", "Trigger deployment"),
        ],
        Industry::Healthcare => &[
            ("/patients", "GET", "List patients"),
            ("/patients/{id}", "GET", "Get patient record"),
            ("/prescriptions", "GET", "List prescriptions"),
            ("/prescriptions/{id}", "GET", "Get prescription"),
            ("/audit-log", "GET", "View audit trail"),
            ("/reports", "POST", "Generate report"),
            ("/providers", "GET", "List providers"),
            ("/appointments", "GET", "List appointments"),
        ],
        Industry::Ecommerce => &[
            ("/products", "GET", "List products"),
            ("/products/{id}", "GET", "Get product details"),
            ("/orders", "GET", "List orders"),
            ("/orders/{id}", "GET", "Get order details"),
            ("/cart", "GET", "Get current cart"),
            ("/cart/items", "POST", "Add item to cart"),
            ("/inventory/{sku}", "GET", "Check inventory"),
            ("/refunds", "POST", "Process refund"),
        ],
        Industry::Devtools => &[
            ("/repositories", "GET", "List repositories"),
            ("/repositories/{id}", "GET", "Get repository"),
            ("/builds", "GET", "List builds"),
            ("/builds/{id}", "GET", "Get build status"),
            ("/secrets", "GET", "List secrets"),
            ("/secrets/{key}", "GET", "Get secret value"),
            ("/deployments", "POST", "Trigger deployment"),
            ("/pipelines", "GET", "List pipelines"),
        ],
        Industry::Logistics => &[
            ("/shipments", "GET", "List shipments"),
            ("/shipments/{id}", "GET", "Get shipment details"),
            ("/shipments", "POST", "Create shipment"),
            ("/tracking/{number}", "GET", "Track shipment"),
            ("/warehouses", "GET", "List warehouses"),
            ("/warehouses/{id}/inventory", "GET", "Warehouse inventory"),
            ("/routes/optimize", "POST", "Optimize route"),
            ("/carriers", "GET", "List carriers"),
        ],
    }
}

/// Paths a crawler is told to avoid, which is exactly where a scanner
/// goes next. Relative to the endpoint prefix.
pub fn disallowed_paths(industry: Industry) -> &'static [&'static str] {
    match industry {
        Industry::Fintech => &["/transactions", "/accounts", "/config"],
        Industry::Saas => &["/users", "/api-keys", "/deployments"],
        Industry::Healthcare => &["/patients", "/prescriptions", "/audit-log"],
        Industry::Ecommerce => &["/orders", "/inventory", "/refunds"],
        Industry::Devtools => &["/secrets", "/builds", "/pipelines"],
        Industry::Logistics => &["/shipments", "/warehouses", "/routes"],
    }
}

/// Endpoint URLs advertised in the sitemap, relative to the prefix.
pub fn sitemap_paths(industry: Industry) -> &'static [&'static str] {
    match industry {
        Industry::Fintech => &["/transactions", "/accounts", "/customers", "/transfers"],
        Industry::Saas => &["/users", "/workspaces", "/api-keys", "/logs"],
        Industry::Healthcare => &["/patients", "/prescriptions", "/providers", "/reports"],
        Industry::Ecommerce => &["/products", "/orders", "/cart", "/inventory"],
        Industry::Devtools => &["/repositories", "/builds", "/secrets", "/deployments"],
        Industry::Logistics => &["/shipments", "/warehouses", "/tracking", "/routes"],
    }
}

// ─── Pack template sets ─────────────────────────────────────────────────────

/// The full starter template set for an industry, paths relative to
/// [`PACK_PREFIX`]. The engine rewrites them onto the persona's prefix.
pub fn pack_templates(industry: Industry) -> Vec<ResponseTemplate> {
    let mut templates = Vec::new();

    for theme in crate::persona::generator::data_themes(industry) {
        let list_body = json!({
            "data": list_rows(industry),
            "meta": {"page": 1, "per_page": 25, "total": 47, "total_pages": 2},
            "request_id": "{{request_id}}"
        });
        templates.push(ResponseTemplate {
            endpoint: format!("{PACK_PREFIX}/{theme}"),
            method: "GET".into(),
            status_code: 200,
            content_type: "application/json".into(),
            headers: BTreeMap::new(),
            body_template: list_body.to_string(),
            description: format!("List {theme}"),
        });

        templates.push(ResponseTemplate {
            endpoint: format!("{PACK_PREFIX}/{theme}/{{{{id}}}}"),
            method: "GET".into(),
            status_code: 200,
            content_type: "application/json".into(),
            headers: BTreeMap::new(),
            body_template: detail_row(industry).to_string(),
            description: format!("Get a single {theme} record"),
        });

        let create_body = json!({
            "id": "{{canary_1}}",
            "status": "created",
            "created_at": "{{timestamp}}"
        });
        templates.push(ResponseTemplate {
            endpoint: format!("{PACK_PREFIX}/{theme}"),
            method: "POST".into(),
            status_code: 201,
            content_type: "application/json".into(),
            headers: BTreeMap::new(),
            body_template: create_body.to_string(),
            description: format!("Create a {theme} record"),
        });
    }

    let health_body = json!({
        "status": "healthy",
        "timestamp": "{{timestamp}}",
        "version": "1.0.0"
    });
    templates.push(ResponseTemplate {
        endpoint: format!("{PACK_PREFIX}/health"),
        method: "GET".into(),
        status_code: 200,
        content_type: "application/json".into(),
        headers: BTreeMap::new(),
        body_template: health_body.to_string(),
        description: "Service health check".into(),
    });

    let status_body = json!({
        "service": "{{company_name}}",
        "uptime_seconds": "{{random_int}}",
        "region": "us-east-1",
        "checked_at": "{{timestamp}}"
    });
    templates.push(ResponseTemplate {
        endpoint: format!("{PACK_PREFIX}/status"),
        method: "GET".into(),
        status_code: 200,
        content_type: "application/json".into(),
        headers: BTreeMap::new(),
        body_template: status_body.to_string(),
        description: "Service status summary".into(),
    });

    templates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_industry_has_a_pack() {
        for industry in Industry::ALL {
            let pack = pack_templates(industry);
            assert!(pack.len() >= 10, "{industry:?} pack too small");
            assert!(pack.iter().any(|t| t.method == "POST"));
            assert!(pack.iter().any(|t| t.endpoint.ends_with("/health")));
        }
    }

    #[test]
    fn pack_endpoints_use_generic_prefix() {
        for industry in Industry::ALL {
            for tpl in pack_templates(industry) {
                assert!(tpl.endpoint.starts_with(PACK_PREFIX), "{}", tpl.endpoint);
            }
        }
    }

    #[test]
    fn list_rows_embed_canary_placeholders() {
        for industry in Industry::ALL {
            let rows = list_rows(industry).to_string();
            assert!(rows.contains("{{canary_1}}"), "{industry:?}");
        }
    }

    #[test]
    fn detail_rows_avoid_public_addresses() {
        for industry in Industry::ALL {
            let body = detail_row(industry).to_string();
            assert!(!body.contains("https://www."));
            if body.contains(".ip") || body.contains("\"ip\"") {
                assert!(body.contains("10.0.1."));
            }
        }
    }

    #[test]
    fn rest_operations_cover_all_industries() {
        for industry in Industry::ALL {
            assert_eq!(rest_operations(industry).len(), 8);
            assert!(!disallowed_paths(industry).is_empty());
            assert_eq!(sitemap_paths(industry).len(), 4);
        }
    }
}

//! Fuzz testing for request path handling.
//!
//! Every incoming path reaches the route table, and every client identifier
//! reaches the classifier. Neither may panic on arbitrary input, and a
//! matched path must always rewrite to an upstream path rooted at `/`.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the routing fuzz target
//! cargo +nightly fuzz run fuzz_routing
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_routing -- -max_total_time=60
//! ```
//!
//! # What This Tests
//!
//! - `PathTemplate::parse` on arbitrary route paths
//! - `RouteTable::find` and `RouteMatch::target_path` on arbitrary request paths
//! - `ClientType::classify` on arbitrary client identifiers

#![no_main]

use std::sync::OnceLock;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use api_gateway::models::RouteDefinition;
use api_gateway::ratelimit::ClientType;
use api_gateway::router::{PathTemplate, RouteTable};

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    route_path: &'a str,
    request_path: &'a str,
    client_id: &'a str,
}

fn table() -> &'static RouteTable {
    static TABLE: OnceLock<RouteTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        RouteTable::new(&[
            RouteDefinition::new("exact", "/gateway/ping", "ping"),
            RouteDefinition::new("wild", "/gateway/catalog/**", "catalog"),
            RouteDefinition::new("orders", "/users/{id}/orders/{order}", "orders"),
            RouteDefinition::new("raw", "/raw/{id}", "raw").with_strip_prefix(false),
        ])
    })
}

fuzz_target!(|input: Input<'_>| {
    // Route paths come from configuration; parsing must never panic
    if let Ok(template) = PathTemplate::parse(input.route_path) {
        let _ = template.captures(input.request_path);
        assert!(input.route_path.starts_with(template.literal_prefix()));
    }

    if let Some(matched) = table().find(input.request_path) {
        let target = matched.target_path(input.request_path);
        assert!(target.starts_with('/'));
    }

    let _ = ClientType::classify(input.client_id);
});

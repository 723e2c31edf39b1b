//! Order payload fixtures shaped like Shopify `orders/paid` webhooks

#![allow(dead_code)]

use serde_json::{json, Value};
use wandini_orchestrator::models::order::OrderJob;

/// Crop used by most tests: on a 40x30 master this is a 20x15 rectangle at (10, 3).
pub fn default_ratio() -> Value {
    json!({ "x": 0.25, "y": 0.1, "w": 0.5, "h": 0.5 })
}

/// Configurator property as the storefront sends it: JSON encoded into a string.
pub fn configurator_property(configurator: Value) -> Value {
    json!({ "name": "configurator_payload", "value": configurator.to_string() })
}

pub fn order_with_configurator(order_id: impl Into<Value>, configurator: Value) -> Value {
    json!({
        "id": order_id.into(),
        "email": "customer@example.com",
        "currency": "EUR",
        "total_price": "79.00",
        "line_items": [
            {
                "title": "Custom print",
                "quantity": 1,
                "properties": [
                    { "name": "_preview", "value": "https://cdn.example.com/p.jpg" },
                    configurator_property(configurator)
                ]
            }
        ]
    })
}

pub fn order_payload(order_id: impl Into<Value>, master_asset_id: &str) -> Value {
    order_with_configurator(
        order_id,
        json!({ "master_asset_id": master_asset_id, "crop_ratio": default_ratio() }),
    )
}

pub fn order_without_configurator(order_id: impl Into<Value>) -> Value {
    json!({
        "id": order_id.into(),
        "email": "customer@example.com",
        "line_items": [
            { "title": "Gift card", "properties": [{ "name": "note", "value": "hi" }] }
        ]
    })
}

pub fn job(order_id: &str, master_asset_id: &str) -> OrderJob {
    OrderJob::from_payload(order_payload(order_id, master_asset_id)).expect("fixture payload is valid")
}

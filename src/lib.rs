//! Wandini order orchestrator
//!
//! Turns Shopify `orders/paid` webhooks into downloadable artifact bundles:
//! the master image for the ordered configuration is fetched, cropped to the
//! customer's selection and packaged with an order metadata document. Orders
//! are processed one at a time by an in-process worker.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;

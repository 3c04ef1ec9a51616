//! Apple App Store adapter.

mod http_client;

pub use http_client::HttpAppleClient;

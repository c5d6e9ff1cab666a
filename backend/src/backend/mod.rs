pub mod client;
pub mod loader;

pub use client::PortfolioApiClient;

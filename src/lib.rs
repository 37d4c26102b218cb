pub mod app;
pub mod conda;
pub mod config;
pub mod cran;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod github;
pub mod output;
pub mod period;
pub mod pypi;
pub mod report;
pub mod store;
pub mod tsv;

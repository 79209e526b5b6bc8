pub mod api;
pub mod audit;
pub mod bot;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod format;
pub mod metrics;
pub mod model;
pub mod paginate;
pub mod raid;
pub mod refresh;
pub mod store;
pub mod upstream;

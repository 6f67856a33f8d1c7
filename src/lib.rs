pub mod api;
pub mod app;
pub mod catalog;
pub mod collaborators;
pub mod conditions;
pub mod config;
pub mod db;
pub mod fetch_error;
pub mod fetchers;
pub mod geo;
pub mod scheduler;
pub mod scoring;
pub mod services;
pub mod station_resolver;
pub mod store;
pub mod tide;
pub mod units;
pub mod workers;

pub mod aggregator;
pub mod api;
pub mod config;
pub mod countries;
pub mod persistence;
pub mod resolver;

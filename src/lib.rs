pub mod app;
pub mod cache;
pub mod completeness;
pub mod config;
pub mod domain;
pub mod error;
pub mod loader;
pub mod output;
pub mod pokeapi;
pub mod reconcile;
pub mod store;

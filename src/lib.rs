pub mod annotation;
pub mod app;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod output;
pub mod reconcile;
pub mod report;
pub mod store;
pub mod table;

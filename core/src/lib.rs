pub mod db;
pub mod error;
pub mod identity;
pub mod kv;
pub mod models;
pub mod service;
pub mod store;
pub mod toast;

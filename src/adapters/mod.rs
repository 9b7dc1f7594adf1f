pub mod file_config_adapter;
pub mod quote_http;
pub mod sqlite_store;
pub mod web;

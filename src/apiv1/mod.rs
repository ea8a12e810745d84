pub mod service;
pub mod spanner_client;

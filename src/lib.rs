pub mod annotate;
pub mod auth;
pub mod config;
pub mod domain;
pub mod dossier;
pub mod ingest;
pub mod mail;
pub mod server;
pub mod store;
pub mod worker;

pub mod connection;
pub mod document_store;
pub mod migrations;
pub mod models;

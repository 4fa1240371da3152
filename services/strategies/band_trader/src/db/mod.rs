//! Trade persistence on SQLite

pub mod connection;
pub mod migrate;
pub mod models;
pub mod schema;
pub mod store;

pub use store::TradeStore;

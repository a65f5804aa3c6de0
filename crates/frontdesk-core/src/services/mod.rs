//! Shared services for Frontdesk clients

mod database;

pub use database::DatabaseService;

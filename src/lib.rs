pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod health;
pub mod openapi;
pub mod policy;
pub mod products;
pub mod state;
pub mod store;
pub mod users;

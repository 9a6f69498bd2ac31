// Library exports for Momentos
// Integration tests drive the router and stores through these modules

pub mod auth;
pub mod captions;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod media;
pub mod plans;
pub mod repository;
pub mod routes;
pub mod state;
pub mod storage;

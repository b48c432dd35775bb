pub mod app_state;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod repositories;
pub mod routes;
pub mod services;

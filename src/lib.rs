pub mod api;
pub mod clients;
pub mod config;
pub mod error;
pub mod job;
pub mod models;
pub mod repository;
pub mod services;
pub mod utils;
pub mod worker;

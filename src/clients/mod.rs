pub mod circuit_breaker;
pub mod configuration;
pub mod database;
pub mod health;
pub mod rbmq;
pub mod template;
pub mod tenant;
pub mod token;

pub mod circuit_breaker;
pub mod configuration;
pub mod event;
pub mod health;
pub mod message;
pub mod notification;
pub mod notification_type;
pub mod retry;
pub mod subscriber;
pub mod subscription;
pub mod template;
pub mod tenant;
pub mod user;

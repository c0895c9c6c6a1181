mod common;

mod retry_tests;
mod subscription_tests;

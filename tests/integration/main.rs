//! Integration test binary

mod api_tests;
mod postgres_tests;
mod router_tests;

//! Integration tests against a mock backend

mod coordinator_test;
mod http_api_test;

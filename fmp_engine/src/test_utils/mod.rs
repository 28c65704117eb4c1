//! Helpers for tests of the engine and of crates that embed it.
pub mod mock_gateway;
pub mod prepare_env;

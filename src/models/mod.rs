pub mod args;
pub mod error;
pub mod http_error_stats;
pub mod input_record;
pub mod outcome;
pub mod replay_config;
pub mod request_descriptor;
pub mod result;

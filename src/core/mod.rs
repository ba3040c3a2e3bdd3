pub mod concurrency_controller;
pub mod execute;
pub mod line_source;
pub mod metric_window;
pub mod output_logs;
pub(crate) mod parse_headers;
pub mod replay_scheduler;
pub mod request_builder;
pub mod result_sink;
pub mod run_summary;
pub mod show_result_with_table;
pub mod stat_accumulator;
pub mod transport;

pub mod core;
pub mod models;

pub use crate::core::execute::{run, run_with};
pub use crate::core::line_source::{LineSource, PauseHandle};
pub use crate::core::metric_window::{Dimension, MetricWindow};
pub use crate::core::replay_scheduler::ReplayScheduler;
pub use crate::core::request_builder::{ReplayBuilder, RequestBuilder, SearchBuilder};
pub use crate::core::result_sink::ResultSink;
pub use crate::core::stat_accumulator::StatAccumulator;
pub use crate::core::transport::{MockTransport, ReqwestTransport, Transport};
pub use crate::models::error::ReplayError;
pub use crate::models::replay_config::ReplayConfig;

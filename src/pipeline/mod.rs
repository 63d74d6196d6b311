//! Pipeline framework: execution state machine, composition, monitoring and
//! the concrete collection pipeline.

pub mod base;
pub mod collect;
pub mod compose;
pub mod monitor;

pub use base::{Pipeline, PipelineContext, PipelineData, PipelineResult, PipelineState, PipelineStatus};
pub use collect::{CollectionPipeline, SportsDataSource};
pub use compose::ComposedPipeline;
pub use monitor::{ConsoleMonitor, EventKind, Monitor, MonitorRegistry, MonitoredPipeline, MonitoringEvent};

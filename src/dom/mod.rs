pub mod collector;
pub mod locator;
pub mod record;
pub mod recorder;
pub mod timing;

pub use collector::{ProgressObserver, TraversalBudget, TreeCollector};
pub use record::{ElementRecord, PageInfo, ScrapeResult};
pub use recorder::RecordOptions;
pub use timing::{TimingAggregator, TimingSummary};

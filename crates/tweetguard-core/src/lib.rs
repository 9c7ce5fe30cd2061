pub mod classifier;
pub mod clock;
pub mod config;
pub mod constants;
pub mod models;
pub mod page;
pub mod queue;
pub mod reporter;
pub mod retry;
pub mod signals;
pub mod sim;
pub mod store;
pub mod tracing_setup;

// Re-export the service objects at crate root for convenience
pub use classifier::{Classifier, ClassifierError, Verdict};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{CoreConfig, Timings};
pub use models::{Handle, TweetId};
pub use page::{DriverError, InteractionSurface, PageDriver, RenderedItem};
pub use queue::{DrainOutcome, QueueEngine};
pub use reporter::{EngineError, PassOutcome, ReportOutcome, Reporter, RunOutcome};
pub use signals::RunSignals;
pub use sim::SimulatedPage;
pub use store::{Database, StoreError};

pub mod bucket;
pub mod clock;
pub mod config;
pub mod edit;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod overlay;
pub mod ownership;
pub mod pages;
pub mod projection;
pub mod scope;
pub mod separator;
pub mod status;
pub mod view_model;

pub use bucket::{bucket, Bucket};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::FeedConfig;
pub use edit::{EditBuffer, EditDraft};
pub use error::{ConfigError, FetchError, MutationError, MutationKind, SaveError};
pub use events::{EventSink, FeedEvent};
pub use orchestrator::Orchestrator;
pub use overlay::FeedOverlay;
pub use pages::{PageCache, PagesState};
pub use projection::{FeedProjection, FeedSnapshot};
pub use separator::{insert_separators, SeparatorInserter, SeparatorLabels};
pub use status::{FeedStatus, StatusCell};
pub use view_model::FeedViewModel;

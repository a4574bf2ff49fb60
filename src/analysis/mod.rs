//! Anomaly and meta-event analysis of the tick metric stream

pub mod detector;
pub mod episodes;
pub mod events;
pub mod output;
pub mod stats;

pub use detector::{analyze, analyze_cancellable, validate_ordering, StreamingDetector};
pub use episodes::{auto_threshold, Episode, EpisodeTracker};
pub use events::{MetaEvent, MetaEventKind, MetaEventPayload};
pub use output::{AnomalyFlag, DetectionSummary, DetectorOutput, MetaEventCounts};
pub use stats::{RunningStats, TrailingStats};

pub mod dense;
pub mod health;
pub mod lk;
pub mod seed;

pub use dense::FlowField;
pub use health::RoundTrip;
pub use lk::{LkTracker, TrackResult, TrackStatus, TrackerConfig};
pub use seed::{Corner, GfttConfig, GfttDetector};

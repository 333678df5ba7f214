pub mod feature_flags;
pub mod feed;
pub mod ranking;

pub use feature_flags::FeatureFlags;
pub use feed::FeedService;
pub use ranking::RankingEngine;

pub mod latency;
pub mod live_game;
pub mod notifier;

pub use latency::{parse_feed_timestamp, LatencyConfig, LatencyMonitor};
pub use live_game::{signal_key, GameSnapshot, LiveGameService, SignalEntry};
pub use notifier::{Alert, AlertLevel, NotificationConfig, NotificationService, WebhookSink};

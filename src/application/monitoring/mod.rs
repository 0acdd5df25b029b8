pub mod price_watch;
pub mod scheduler;

pub use price_watch::{PriceTriggerKind, evaluate_price_triggers, technical_trigger};
pub use scheduler::{MonitoringScheduler, SchedulerConfig};

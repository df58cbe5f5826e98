//! Background services: periodic publishers and their notifiers
//!
//! Each plot pipeline gets one tokio task that refreshes its datasource on a
//! fixed cadence and then broadcasts a "data ready" signal to subscribed
//! renderers.

pub mod notifier;
pub mod publisher;

pub use notifier::{Notifier, SubscriberId};
pub use publisher::{PeriodicPublisher, PublisherState};

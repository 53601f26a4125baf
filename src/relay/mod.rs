//! Relay connection handling: a single-relay client with a background read
//! loop, multiplexed by a supervisor that reconciles the desired relay set
//! against what's actually connected, plus the subscription planner that
//! turns an account's follow graph into filter bundles.

mod client;
mod planner;
mod supervisor;

pub use client::{RelayClient, RelayEvent};
pub use planner::{plan_subscriptions, SubscriptionPlan};
pub use supervisor::Supervisor;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("relay pool error: {0}")]
    Pool(#[from] nostr_relay_pool::pool::Error),

    #[error("invalid relay url: {0}")]
    InvalidUrl(String),

    #[error("event builder error: {0}")]
    Builder(#[from] nostr::event::builder::Error),

    #[error("relay is shutting down")]
    ShuttingDown,
}

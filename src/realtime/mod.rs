pub mod bridge;
pub mod broker;
pub mod connection;
pub mod errors;
pub mod event;
pub mod hub;
pub mod memory_broker;
pub mod publisher;
pub mod registry;

pub use broker::{Broker, BrokerMessage, topic_for};
pub use errors::{BrokerError, RealtimeError};
pub use event::{ChangeEvent, ChangeKind};
pub use hub::Realtime;
pub use memory_broker::{MemoryBroker, MemoryBrokerClient};
pub use publisher::ChangePublisher;

#[cfg(test)]
mod bridge_test;

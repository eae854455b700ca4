// publisher/mod.rs
pub mod amqp_store;
pub mod csv_store;
pub mod record;
pub mod state_publisher;
pub mod store;

pub use amqp_store::AmqpStore;
pub use csv_store::{CsvStore, StoreRecord};
pub use record::PublishRecord;
pub use state_publisher::{PublisherSettings, PublisherStatsSnapshot, StatePublisher};
pub use store::{open_store, LogStore, MemoryStore, StateStore};

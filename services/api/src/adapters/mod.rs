pub mod db;
pub mod file_store;
pub mod records;
pub mod solar;
pub mod telegram;

pub use db::PgStore;
pub use file_store::{JsonLedger, JsonSubscriberStore};
pub use solar::SolarCalculator;
pub use telegram::TelegramTransport;

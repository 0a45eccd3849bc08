// Settings Module - Shared configuration store
//
// Handles:
// - Typed settings record and storage key names
// - Storage backend contract and the degrading `Storage` facade
// - Change subscriptions across the sync and local areas
// - Hostname whitelist helpers

pub mod memory;
pub mod storage;
pub mod types;
pub mod whitelist;

pub use memory::MemoryStorage;
pub use storage::{
    Keys, Storage, StorageArea, StorageBackend, StorageChange, StorageEvent, Subscription,
};
pub use types::*;

pub mod memory;
pub mod seed;
pub mod store;

pub use memory::{InMemoryStore, MemoryTransaction};
pub use seed::{SeedData, SeedSlot};
pub use store::{SchedulingStore, StoreError, StoreTransaction};

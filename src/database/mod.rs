pub mod attempt_store;
pub mod catalog_store;
pub mod memory;
pub mod pool;

pub use attempt_store::{AttemptStore, InsertAnswerOutcome, PgAttemptStore, TransitionOutcome};
pub use catalog_store::{CatalogStore, PgCatalogStore};
pub use memory::MemoryStore;

pub mod error;
pub mod redb;
pub mod traits;

pub use error::KVError;
pub use redb::{RedbSnapshot, RedbStore};
pub use traits::{KVSnapshot, KVStore, WriteOp};

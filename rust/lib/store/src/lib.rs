//! Schema-less record store.
//!
//! Models implement [`Record`] to declare their bucket and key. Reads and
//! writes go through a [`Transaction`] opened on a [`Store`]; queries are
//! built from [`Matcher`]s and executed through a [`Query`] cursor.
//!
//! ```ignore
//! let mut tx = store.begin(true)?;
//! tx.save(&mut user)?;
//! tx.save(&mut binding)?;
//! tx.commit()?;
//!
//! let tx = store.begin(false)?;
//! let admins: Vec<User> = tx
//!     .select(vec![Matcher::eq("is_admin", true)])
//!     .order_by("created_at")
//!     .reverse()
//!     .find()?;
//! ```

pub mod condition;
pub mod db;
pub mod error;
pub mod matcher;
pub mod query;
pub mod record;
pub mod tx;

pub use condition::{Condition, FieldKind, Operator, QueryWindow, Searchable};
pub use db::Store;
pub use error::{QueryError, StoreError};
pub use matcher::Matcher;
pub use query::Query;
pub use record::Record;
pub use tx::Transaction;

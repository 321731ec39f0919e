pub mod key;
pub mod locks;
pub mod store;

pub use key::{encode_source, file_name, namespace_dir};
pub use locks::{KeyGuard, LockRegistry};
pub use store::{CacheStore, StoreError, StoredFile};

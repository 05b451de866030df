//! Byte store module
//!
//! Durable, name-keyed storage for uploaded files. The filesystem backend is
//! the production store; the in-memory backend shares its contract.

mod error;
mod index;
mod local;
mod memory;
mod traits;

pub use error::{StorageError, StorageResult};
pub use index::validate_name;
pub use local::LocalByteStore;
pub use memory::MemoryByteStore;
pub use traits::{BoxError, ByteStore, ByteStream, OpenedObject, StoredObject, UploadStream};

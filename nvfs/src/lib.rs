//! A user-space virtual filesystem: a single flat image file holding a
//! hierarchy of owner-tagged folders and files, addressed through a pair of
//! first-fit segment allocators and an index-node table, much like a real
//! disk filesystem but entirely contained in one file.

mod access;
mod account;
mod allocator;
mod dir;
mod engine;
mod error;
mod handle;
mod image;
mod util;

pub use access::AccessMode;
pub use engine::{DiskCapacity, Engine, EnumResult, FileEntry};
pub use error::FsError;
pub use handle::FileHandleId;
pub use util::ByteSize;

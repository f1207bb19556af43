//! Open file handles.
//!
//! An open handle is nothing but an index node number wrapped in a small
//! integer id; reads and writes alias the image buffer directly rather than
//! copying through an intermediate object, so there is no buffering layer
//! to keep in sync.

pub type FileHandleId = u32;

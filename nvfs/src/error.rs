//! The error type threaded through the engine's private helpers.
//!
//! Every public operation on [`crate::Engine`] collapses a `Result<_, FsError>`
//! down to the boolean/`Option`-flavoured surface the virtual filesystem
//! exposes to callers, logging the discarded error via `eprintln!` first.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum FsError {
	AlreadyInstalled,
	NotInstalled,
	Corrupt(&'static str),
	Io(io::Error),
	NameEmpty,
	NameTooLong,
	NameHasDelimiter,
	NameTaken,
	ZeroLengthFile,
	NotFound,
	NoSpace,
	NoInodes,
	FileOpen,
	OutOfBounds,
	NotLoggedIn,
	PathInvalid,
	UnknownHandle,
}

impl fmt::Display for FsError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::AlreadyInstalled => write!(f, "virtual disk is already installed"),
			Self::NotInstalled => write!(f, "virtual disk is not installed"),
			Self::Corrupt(why) => write!(f, "corrupted virtual disk image: {why}"),
			Self::Io(e) => write!(f, "{e}"),
			Self::NameEmpty => write!(f, "name must not be empty"),
			Self::NameTooLong => write!(f, "name too long (>120 bytes)"),
			Self::NameHasDelimiter => write!(f, "'/' and '\\' are not permitted in a name"),
			Self::NameTaken => write!(f, "a folder or file with that name already exists"),
			Self::ZeroLengthFile => write!(f, "file size must be greater than zero"),
			Self::NotFound => write!(f, "no such file or folder"),
			Self::NoSpace => write!(f, "not enough free space on the virtual disk"),
			Self::NoInodes => write!(f, "no free index nodes left"),
			Self::FileOpen => write!(f, "file is currently open"),
			Self::OutOfBounds => write!(f, "read or write range past end of file"),
			Self::NotLoggedIn => write!(f, "no account is logged in"),
			Self::PathInvalid => write!(f, "path must start with '/' or '\\'"),
			Self::UnknownHandle => write!(f, "unknown file handle"),
		}
	}
}

impl std::error::Error for FsError {}

impl From<io::Error> for FsError {
	fn from(e: io::Error) -> Self {
		Self::Io(e)
	}
}

//! Small helpers shared across the crate, in the same spirit as
//! `mutils`' own grab-bag `util` module.

use std::fmt;
use std::io::{self, Write};

use crate::error::FsError;

/// A folder or file name must be non-empty, fit in the 120 printable bytes
/// of a [`crate::dir::DirRecord`], and contain neither path separator.
pub fn validate_name(name: &str) -> Result<(), FsError> {
	if name.is_empty() {
		return Err(FsError::NameEmpty);
	}
	if name.len() > 120 {
		return Err(FsError::NameTooLong);
	}
	if name.contains('/') || name.contains('\\') {
		return Err(FsError::NameHasDelimiter);
	}
	Ok(())
}

/// Borrow any `Copy` value as its raw bytes, for writing fixed-layout
/// records straight to a file. Mirrors `mkfs`'s `reinterpret` helper.
pub fn reinterpret<T>(value: &T) -> &[u8] {
	unsafe { std::slice::from_raw_parts(value as *const T as *const u8, std::mem::size_of::<T>()) }
}

/// Write `remaining` zero bytes to `file` in fixed-size chunks, used to pad
/// a freshly created virtual disk image out to its full capacity without
/// holding the whole thing in memory.
pub fn write_zeros<W: Write>(file: &mut W, mut remaining: u64) -> io::Result<()> {
	let buf = [0u8; 1 << 16];
	while remaining > 0 {
		let chunk = remaining.min(buf.len() as u64) as usize;
		file.write_all(&buf[..chunk])?;
		remaining -= chunk as u64;
	}
	Ok(())
}

/// A byte count that prints with the most natural unit, used by `mkvdisk`
/// and `vfsh` when reporting capacity and usage.
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
		let mut value = self.0 as f64;
		let mut unit = 0;
		while value >= 1024.0 && unit < UNITS.len() - 1 {
			value /= 1024.0;
			unit += 1;
		}
		if unit == 0 {
			write!(f, "{}{}", self.0, UNITS[unit])
		} else {
			write!(f, "{value:.1}{}", UNITS[unit])
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn rejects_empty_and_delimited_names() {
		assert!(validate_name("").is_err());
		assert!(validate_name("a/b").is_err());
		assert!(validate_name("a\\b").is_err());
		assert!(validate_name(&"x".repeat(121)).is_err());
		assert!(validate_name("notes.txt").is_ok());
	}

	#[test]
	fn byte_size_formatting() {
		assert_eq!(ByteSize(512).to_string(), "512B");
		assert_eq!(ByteSize(2048).to_string(), "2.0KiB");
		assert_eq!(ByteSize(1024 * 1024 * 128).to_string(), "128.0MiB");
	}
}

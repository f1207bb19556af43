//! Directory file codec.
//!
//! A directory's contents are a small header (folder count, file count)
//! followed by a flat array of fixed-size records, folders first, then
//! files. Whenever a directory's membership changes the whole thing is
//! re-allocated and rewritten rather than patched in place, matching the
//! original engine's always-relocate strategy.

use crate::image::ImageBuffer;

pub const DIR_RECORD_SIZE: u32 = 128;
pub const DIR_HEADER_SIZE: u32 = 8;
const NAME_LEN: usize = 124;

#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct DirRecord {
	pub name: [u8; NAME_LEN],
	pub index_node_id: u32,
}

/// Pad or truncate `name` into the fixed-width on-disk field. Callers are
/// expected to have already run the name through [`crate::util::validate_name`].
pub fn encode_name(name: &str) -> [u8; NAME_LEN] {
	let mut buf = [0u8; NAME_LEN];
	let bytes = name.as_bytes();
	let len = bytes.len().min(NAME_LEN);
	buf[..len].copy_from_slice(&bytes[..len]);
	buf
}

/// Decode stops at the first NUL byte within the first 120 bytes, or at
/// byte 120 if none is found, leaving the last 4 bytes as a guard band.
pub fn decode_name(raw: &[u8; NAME_LEN]) -> String {
	let scan = &raw[..120];
	let len = scan.iter().position(|&b| b == 0).unwrap_or(120);
	String::from_utf8_lossy(&raw[..len]).into_owned()
}

/// Read a directory's folder and file record lists out of the image at
/// `addr` (relative to the end of the header).
pub fn read_dir(image: &ImageBuffer, header_len: u32, addr: u32) -> (u32, u32, Vec<DirRecord>, Vec<DirRecord>) {
	let base = (header_len + addr) as usize;
	let folder_count: u32 = image.read(base);
	let file_count: u32 = image.read(base + 4);
	let mut folders = Vec::with_capacity(folder_count as usize);
	let mut files = Vec::with_capacity(file_count as usize);
	for i in 0..folder_count {
		folders.push(image.read(base + 8 + (i * DIR_RECORD_SIZE) as usize));
	}
	for i in 0..file_count {
		files.push(image.read(base + 8 + ((folder_count + i) * DIR_RECORD_SIZE) as usize));
	}
	(folder_count, file_count, folders, files)
}

/// Write a directory's folder and file record lists at `addr`. The caller
/// owns allocating a region of the right size beforehand.
pub fn write_dir(image: &mut ImageBuffer, header_len: u32, addr: u32, folders: &[DirRecord], files: &[DirRecord]) {
	let base = (header_len + addr) as usize;
	image.write(base, folders.len() as u32);
	image.write(base + 4, files.len() as u32);
	for (i, rec) in folders.iter().enumerate() {
		image.write(base + 8 + i * DIR_RECORD_SIZE as usize, *rec);
	}
	for (i, rec) in files.iter().enumerate() {
		image.write(base + 8 + (folders.len() + i) * DIR_RECORD_SIZE as usize, *rec);
	}
}

/// Size in bytes of a directory holding `folder_count` folders and
/// `file_count` files.
pub fn dir_size(folder_count: u32, file_count: u32) -> u32 {
	DIR_HEADER_SIZE + (folder_count + file_count) * DIR_RECORD_SIZE
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn name_round_trip() {
		let raw = encode_name("notes.txt");
		assert_eq!(decode_name(&raw), "notes.txt");
	}

	#[test]
	fn name_truncates_and_stops_at_nul() {
		let long = "a".repeat(124);
		let raw = encode_name(&long);
		assert_eq!(decode_name(&raw).len(), 120);
	}

	#[test]
	fn dir_read_write_round_trip() {
		let mut image = ImageBuffer::new(vec![0u8; 4096]);
		let folders = vec![DirRecord { name: encode_name("sub"), index_node_id: 2 }];
		let files = vec![
			DirRecord { name: encode_name("a.txt"), index_node_id: 3 },
			DirRecord { name: encode_name("b.txt"), index_node_id: 4 },
		];
		write_dir(&mut image, 0, 100, &folders, &files);
		let (fc, flc, back_folders, back_files) = read_dir(&image, 0, 100);
		assert_eq!(fc, 1);
		assert_eq!(flc, 2);
		assert_eq!(decode_name(&back_folders[0].name), "sub");
		assert_eq!(decode_name(&back_files[1].name), "b.txt");
	}
}

//! The filesystem engine: owns the image, both allocators, the inode table,
//! the current login and working directory, and the open-handle table, and
//! implements every operation a caller can perform on a virtual disk.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::ptr;

use crate::access::AccessMode;
use crate::account;
use crate::allocator::{SegmentAllocator, ALLOC_FAIL};
use crate::dir::{self, DirRecord};
use crate::error::FsError;
use crate::handle::FileHandleId;
use crate::image::{ImageBuffer, Inode, VirtualDiskHeader, HEADER_SIZE, INODE_SIZE, MAGIC, VERSION};
use crate::util::{reinterpret, validate_name, write_zeros};

/// The preset capacities a fresh virtual disk can be created with. Each
/// preset fixes both the byte capacity of the data region and the size of
/// the index node table, since both are laid out once at creation time and
/// never grown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskCapacity {
	Mb128,
	Mb256,
	Mb512,
	Gb1,
}

impl DiskCapacity {
	fn params(self) -> (u32, u32) {
		match self {
			Self::Mb128 => (128 * 1024 * 1024, 16 * 1024),
			Self::Mb256 => (256 * 1024 * 1024, 32 * 1024),
			Self::Mb512 => (512 * 1024 * 1024, 64 * 1024),
			Self::Gb1 => (1024 * 1024 * 1024, 128 * 1024),
		}
	}

	/// The disk-capacity byte count for this preset, for callers that just
	/// want to report it (e.g. `mkvdisk`'s summary line).
	pub fn bytes(self) -> u32 {
		self.params().0
	}
}

/// One entry returned by [`Engine::enumerate_files_and_dirs`].
#[derive(Debug, Clone)]
pub struct FileEntry {
	pub name: String,
	pub owner: u8,
	pub mode: AccessMode,
	pub size: u32,
}

/// The folders and visible files of the current working directory.
#[derive(Debug, Clone, Default)]
pub struct EnumResult {
	pub folders: Vec<String>,
	pub files: Vec<FileEntry>,
}

struct Installed {
	path: PathBuf,
	header_len: u32,
	capacity: u32,
	image: ImageBuffer,
	inodes: Vec<Inode>,
	data_alloc: SegmentAllocator,
	inode_alloc: SegmentAllocator,
	cur_dir: u32,
	cur_path: String,
	open_files: HashMap<FileHandleId, u32>,
	next_handle: FileHandleId,
}

impl Installed {
	fn read_dir_of(&self, inode_idx: u32) -> (u32, u32, Vec<DirRecord>, Vec<DirRecord>) {
		let inode = self.inodes[inode_idx as usize];
		dir::read_dir(&self.image, self.header_len, inode.address)
	}

	fn write_dir_of(&mut self, inode_idx: u32, folders: &[DirRecord], files: &[DirRecord]) {
		let addr = self.inodes[inode_idx as usize].address;
		dir::write_dir(&mut self.image, self.header_len, addr, folders, files);
	}

	fn persist_inode(&mut self, idx: u32) {
		let offset = HEADER_SIZE + idx as usize * INODE_SIZE;
		self.image.write(offset, self.inodes[idx as usize]);
	}
}

/// Walk the subtree rooted at `inode_idx` looking for any open file.
fn subtree_has_open_file(state: &Installed, inode_idx: u32) -> bool {
	let (_, _, folders, files) = state.read_dir_of(inode_idx);
	for f in &files {
		if state.inodes[f.index_node_id as usize].is_file_opened != 0 {
			return true;
		}
	}
	folders.iter().any(|d| subtree_has_open_file(state, d.index_node_id))
}

/// Release the data segment and inode number of `inode_idx` and, if it is a
/// folder, everything beneath it, post-order.
fn release_subtree(state: &mut Installed, inode_idx: u32) {
	let (_, _, folders, files) = state.read_dir_of(inode_idx);
	for f in &files {
		release_inode(state, f.index_node_id);
	}
	for d in &folders {
		release_subtree(state, d.index_node_id);
	}
	release_inode(state, inode_idx);
}

fn release_inode(state: &mut Installed, inode_idx: u32) {
	let inode = state.inodes[inode_idx as usize];
	state.data_alloc.release(inode.address, inode.size);
	state.inode_alloc.release(inode_idx, 1);
	state.inodes[inode_idx as usize] = Inode::default();
}

/// The virtual filesystem engine. One `Engine` owns at most one installed
/// virtual disk at a time.
pub struct Engine {
	state: Option<Installed>,
	logged_in: u8,
}

impl Default for Engine {
	fn default() -> Self {
		Self::new()
	}
}

impl Engine {
	pub fn new() -> Self {
		Self { state: None, logged_in: account::OWNER_NULL }
	}

	// ---- disk lifecycle -------------------------------------------------

	/// Create a fresh, empty virtual disk image file at `path`.
	pub fn create_virtual_disk(path: &Path, capacity: DiskCapacity) -> bool {
		match Self::try_create_virtual_disk(path, capacity) {
			Ok(()) => true,
			Err(e) => {
				eprintln!("nvfs: create_virtual_disk: {e}");
				false
			}
		}
	}

	fn try_create_virtual_disk(path: &Path, capacity: DiskCapacity) -> Result<(), FsError> {
		let (disk_capacity, index_node_count) = capacity.params();
		let header_len = HEADER_SIZE as u32 + index_node_count * INODE_SIZE as u32;
		let header = VirtualDiskHeader {
			magic: MAGIC,
			version: VERSION,
			disk_capacity,
			disk_header_length: header_len,
			index_node_count,
		};
		let mut file = File::create(path)?;
		file.write_all(reinterpret(&header))?;
		let root = Inode {
			owner_user_id: account::OWNER_ROOT,
			is_file_opened: 0,
			access_mode: (AccessMode::READ | AccessMode::WRITE).bits(),
			address: 0,
			size: dir::DIR_HEADER_SIZE,
		};
		file.write_all(reinterpret(&root))?;
		let remaining_inodes = (index_node_count - 1) as u64 * INODE_SIZE as u64;
		write_zeros(&mut file, remaining_inodes)?;
		write_zeros(&mut file, disk_capacity as u64)?;
		Ok(())
	}

	/// Load `path` into memory and make it the engine's active disk.
	pub fn install_virtual_disk(&mut self, path: &Path) -> bool {
		match self.try_install(path) {
			Ok(()) => true,
			Err(e) => {
				eprintln!("nvfs: install_virtual_disk: {e}");
				false
			}
		}
	}

	fn try_install(&mut self, path: &Path) -> Result<(), FsError> {
		if self.state.is_some() {
			return Err(FsError::AlreadyInstalled);
		}
		let mut file = File::open(path)?;
		let mut bytes = Vec::new();
		file.read_to_end(&mut bytes)?;
		if bytes.len() < HEADER_SIZE {
			return Err(FsError::Corrupt("image too small for a header"));
		}
		let header: VirtualDiskHeader = unsafe { ptr::read_unaligned(bytes.as_ptr() as *const _) };
		if header.magic != MAGIC {
			return Err(FsError::Corrupt("bad magic number"));
		}
		if header.version != VERSION {
			return Err(FsError::Corrupt("unsupported version"));
		}
		let header_len = header.disk_header_length;
		let capacity = header.disk_capacity;
		if bytes.len() as u64 != header_len as u64 + capacity as u64 {
			return Err(FsError::Corrupt("image size does not match header"));
		}
		let index_node_count = header.index_node_count;
		let image = ImageBuffer::new(bytes);
		let mut inodes = Vec::with_capacity(index_node_count as usize);
		for i in 0..index_node_count {
			inodes.push(image.read::<Inode>(HEADER_SIZE + i as usize * INODE_SIZE));
		}
		let mut data_alloc = SegmentAllocator::new(capacity);
		let mut inode_alloc = SegmentAllocator::new(index_node_count);
		for (i, inode) in inodes.iter().enumerate() {
			if inode.owner_user_id != account::OWNER_NULL {
				inode_alloc.allocate_at(i as u32, 1);
				data_alloc.allocate_at(inode.address, inode.size);
			}
		}
		self.state = Some(Installed {
			path: path.to_path_buf(),
			header_len,
			capacity,
			image,
			inodes,
			data_alloc,
			inode_alloc,
			cur_dir: 0,
			cur_path: "/".to_string(),
			open_files: HashMap::new(),
			next_handle: 0,
		});
		Ok(())
	}

	/// Close every open handle, flush the image back to disk, and drop the
	/// in-memory state.
	pub fn uninstall_virtual_disk(&mut self) {
		let Some(mut state) = self.state.take() else {
			eprintln!("nvfs: uninstall_virtual_disk: no virtual disk is installed");
			return;
		};
		for idx in state.open_files.values().copied().collect::<Vec<_>>() {
			state.inodes[idx as usize].is_file_opened = 0;
		}
		state.open_files.clear();
		for i in 0..state.inodes.len() as u32 {
			state.persist_inode(i);
		}
		if let Err(e) = Self::flush(&state) {
			eprintln!("nvfs: uninstall_virtual_disk: failed to write image: {e}");
		}
	}

	fn flush(state: &Installed) -> std::io::Result<()> {
		let mut file = OpenOptions::new().write(true).truncate(true).open(&state.path)?;
		file.write_all(state.image.as_bytes())
	}

	// ---- accounts ---------------------------------------------------------

	pub fn login(&mut self, user: &str, pass: &str) -> bool {
		match account::authenticate(user, pass) {
			Some(id) => {
				self.logged_in = id;
				true
			}
			None => {
				eprintln!("nvfs: login: invalid user name or password");
				false
			}
		}
	}

	pub fn logout(&mut self) {
		self.logged_in = account::OWNER_NULL;
	}

	pub fn is_logged_in(&self) -> bool {
		self.logged_in != account::OWNER_NULL
	}

	// ---- navigation ---------------------------------------------------

	pub fn get_working_dir(&self) -> String {
		self.state.as_ref().map(|s| s.cur_path.clone()).unwrap_or_default()
	}

	pub fn set_working_dir(&mut self, path: &str) -> bool {
		match self.try_set_working_dir(path) {
			Ok(()) => true,
			Err(e) => {
				eprintln!("nvfs: set_working_dir: {e}");
				false
			}
		}
	}

	fn try_set_working_dir(&mut self, path: &str) -> Result<(), FsError> {
		let state = self.state.as_mut().ok_or(FsError::NotInstalled)?;
		let mut chars = path.chars();
		match chars.next() {
			Some('/') | Some('\\') => {}
			_ => return Err(FsError::PathInvalid),
		}
		let rest = &path[1..];
		let mut cursor = 0u32;
		for segment in rest.split(['/', '\\']).filter(|s| !s.is_empty()) {
			let (_, _, folders, _) = state.read_dir_of(cursor);
			let found = folders.iter().find(|f| dir::decode_name(&f.name) == segment);
			match found {
				Some(rec) => cursor = rec.index_node_id,
				None => return Err(FsError::NotFound),
			}
		}
		state.cur_dir = cursor;
		state.cur_path = path.to_string();
		Ok(())
	}

	// ---- folders --------------------------------------------------------

	pub fn create_folder(&mut self, name: &str) -> bool {
		match self.try_create_folder(name) {
			Ok(()) => true,
			Err(e) => {
				eprintln!("nvfs: create_folder: {e}");
				false
			}
		}
	}

	fn try_create_folder(&mut self, name: &str) -> Result<(), FsError> {
		validate_name(name)?;
		let state = self.state.as_mut().ok_or(FsError::NotInstalled)?;
		let (folder_count, file_count, mut folders, files) = state.read_dir_of(state.cur_dir);
		if folders.iter().any(|f| dir::decode_name(&f.name) == name)
			|| files.iter().any(|f| dir::decode_name(&f.name) == name)
		{
			return Err(FsError::NameTaken);
		}
		if state.inode_alloc.is_exhausted() {
			return Err(FsError::NoInodes);
		}

		let child_inode = state.inode_alloc.allocate_any(1);
		if child_inode == ALLOC_FAIL {
			return Err(FsError::NoInodes);
		}
		let child_addr = state.data_alloc.allocate_any(dir::DIR_HEADER_SIZE);
		if child_addr == ALLOC_FAIL {
			state.inode_alloc.release(child_inode, 1);
			return Err(FsError::NoSpace);
		}

		state.inodes[child_inode as usize] = Inode {
			owner_user_id: account::OWNER_ROOT,
			is_file_opened: 0,
			access_mode: (AccessMode::READ | AccessMode::WRITE).bits(),
			address: child_addr,
			size: dir::DIR_HEADER_SIZE,
		};
		dir::write_dir(&mut state.image, state.header_len, child_addr, &[], &[]);

		let cur_inode = state.inodes[state.cur_dir as usize];
		state.data_alloc.release(cur_inode.address, cur_inode.size);
		let new_size = dir::dir_size(folder_count + 1, file_count);
		let new_addr = state.data_alloc.allocate_any(new_size);
		if new_addr == ALLOC_FAIL {
			let restored = state.data_alloc.allocate_at(cur_inode.address, cur_inode.size);
			debug_assert!(restored, "just-released directory segment must still be free");
			state.data_alloc.release(child_addr, dir::DIR_HEADER_SIZE);
			state.inode_alloc.release(child_inode, 1);
			return Err(FsError::NoSpace);
		}
		state.inodes[state.cur_dir as usize].address = new_addr;
		state.inodes[state.cur_dir as usize].size = new_size;
		folders.push(DirRecord { name: dir::encode_name(name), index_node_id: child_inode });
		state.write_dir_of(state.cur_dir, &folders, &files);
		Ok(())
	}

	pub fn delete_folder(&mut self, name: &str) -> bool {
		match self.try_delete_folder(name) {
			Ok(()) => true,
			Err(e) => {
				eprintln!("nvfs: delete_folder: {e}");
				false
			}
		}
	}

	fn try_delete_folder(&mut self, name: &str) -> Result<(), FsError> {
		validate_name(name)?;
		let state = self.state.as_mut().ok_or(FsError::NotInstalled)?;
		let (folder_count, file_count, mut folders, files) = state.read_dir_of(state.cur_dir);
		let pos = folders
			.iter()
			.position(|f| dir::decode_name(&f.name) == name)
			.ok_or(FsError::NotFound)?;
		let target = folders[pos].index_node_id;
		if subtree_has_open_file(state, target) {
			return Err(FsError::FileOpen);
		}
		release_subtree(state, target);
		folders.remove(pos);

		let cur_inode = state.inodes[state.cur_dir as usize];
		state.data_alloc.release(cur_inode.address, cur_inode.size);
		let new_size = dir::dir_size(folder_count - 1, file_count);
		let new_addr = state.data_alloc.allocate_any(new_size);
		if new_addr == ALLOC_FAIL {
			return Err(FsError::NoSpace);
		}
		state.inodes[state.cur_dir as usize].address = new_addr;
		state.inodes[state.cur_dir as usize].size = new_size;
		state.write_dir_of(state.cur_dir, &folders, &files);
		Ok(())
	}

	// ---- files ------------------------------------------------------------

	pub fn create_file(&mut self, name: &str, byte_size: u32, mode: AccessMode) -> bool {
		match self.try_create_file(name, byte_size, mode) {
			Ok(()) => true,
			Err(e) => {
				eprintln!("nvfs: create_file: {e}");
				false
			}
		}
	}

	fn try_create_file(&mut self, name: &str, byte_size: u32, mode: AccessMode) -> Result<(), FsError> {
		if self.logged_in == account::OWNER_NULL {
			return Err(FsError::NotLoggedIn);
		}
		if byte_size == 0 {
			return Err(FsError::ZeroLengthFile);
		}
		validate_name(name)?;
		let owner = self.logged_in;
		let state = self.state.as_mut().ok_or(FsError::NotInstalled)?;
		let (folder_count, file_count, folders, mut files) = state.read_dir_of(state.cur_dir);
		if folders.iter().any(|f| dir::decode_name(&f.name) == name)
			|| files.iter().any(|f| dir::decode_name(&f.name) == name)
		{
			return Err(FsError::NameTaken);
		}
		if state.inode_alloc.is_exhausted() {
			return Err(FsError::NoInodes);
		}

		let child_inode = state.inode_alloc.allocate_any(1);
		if child_inode == ALLOC_FAIL {
			return Err(FsError::NoInodes);
		}
		let child_addr = state.data_alloc.allocate_any(byte_size);
		if child_addr == ALLOC_FAIL {
			state.inode_alloc.release(child_inode, 1);
			return Err(FsError::NoSpace);
		}

		state.inodes[child_inode as usize] = Inode {
			owner_user_id: owner,
			is_file_opened: 0,
			access_mode: mode.bits(),
			address: child_addr,
			size: byte_size,
		};

		let cur_inode = state.inodes[state.cur_dir as usize];
		state.data_alloc.release(cur_inode.address, cur_inode.size);
		let new_size = dir::dir_size(folder_count, file_count + 1);
		let new_addr = state.data_alloc.allocate_any(new_size);
		if new_addr == ALLOC_FAIL {
			let restored = state.data_alloc.allocate_at(cur_inode.address, cur_inode.size);
			debug_assert!(restored, "just-released directory segment must still be free");
			state.data_alloc.release(child_addr, byte_size);
			state.inode_alloc.release(child_inode, 1);
			return Err(FsError::NoSpace);
		}
		state.inodes[state.cur_dir as usize].address = new_addr;
		state.inodes[state.cur_dir as usize].size = new_size;
		files.push(DirRecord { name: dir::encode_name(name), index_node_id: child_inode });
		state.write_dir_of(state.cur_dir, &folders, &files);
		Ok(())
	}

	pub fn delete_file(&mut self, name: &str) -> bool {
		match self.try_delete_file(name) {
			Ok(()) => true,
			Err(e) => {
				eprintln!("nvfs: delete_file: {e}");
				false
			}
		}
	}

	fn try_delete_file(&mut self, name: &str) -> Result<(), FsError> {
		validate_name(name)?;
		let state = self.state.as_mut().ok_or(FsError::NotInstalled)?;
		let (folder_count, file_count, folders, mut files) = state.read_dir_of(state.cur_dir);
		let pos = files
			.iter()
			.position(|f| dir::decode_name(&f.name) == name)
			.ok_or(FsError::NotFound)?;
		let target = files[pos].index_node_id;
		if state.inodes[target as usize].is_file_opened != 0 {
			return Err(FsError::FileOpen);
		}
		release_inode(state, target);
		files.remove(pos);

		let cur_inode = state.inodes[state.cur_dir as usize];
		state.data_alloc.release(cur_inode.address, cur_inode.size);
		let new_size = dir::dir_size(folder_count, file_count - 1);
		let new_addr = state.data_alloc.allocate_any(new_size);
		if new_addr == ALLOC_FAIL {
			return Err(FsError::NoSpace);
		}
		state.inodes[state.cur_dir as usize].address = new_addr;
		state.inodes[state.cur_dir as usize].size = new_size;
		state.write_dir_of(state.cur_dir, &folders, &files);
		Ok(())
	}

	pub fn open_file(&mut self, name: &str) -> Option<FileHandleId> {
		match self.try_open_file(name) {
			Ok(id) => Some(id),
			Err(e) => {
				eprintln!("nvfs: open_file: {e}");
				None
			}
		}
	}

	fn try_open_file(&mut self, name: &str) -> Result<FileHandleId, FsError> {
		validate_name(name)?;
		let state = self.state.as_mut().ok_or(FsError::NotInstalled)?;
		let (_, _, _, files) = state.read_dir_of(state.cur_dir);
		let rec = files
			.iter()
			.find(|f| dir::decode_name(&f.name) == name)
			.ok_or(FsError::NotFound)?;
		let idx = rec.index_node_id;
		if state.inodes[idx as usize].is_file_opened != 0 {
			return Err(FsError::FileOpen);
		}
		state.inodes[idx as usize].is_file_opened = 1;
		let id = state.next_handle;
		state.next_handle += 1;
		state.open_files.insert(id, idx);
		Ok(id)
	}

	pub fn close_file(&mut self, handle: FileHandleId) -> bool {
		let Some(state) = self.state.as_mut() else {
			eprintln!("nvfs: close_file: {}", FsError::NotInstalled);
			return false;
		};
		match state.open_files.remove(&handle) {
			Some(idx) => {
				state.inodes[idx as usize].is_file_opened = 0;
				true
			}
			None => {
				eprintln!("nvfs: close_file: {}", FsError::UnknownHandle);
				false
			}
		}
	}

	pub fn read(&self, handle: FileHandleId, dst: &mut [u8], start: u32, size: u32) -> bool {
		match self.try_read(handle, dst, start, size) {
			Ok(()) => true,
			Err(e) => {
				eprintln!("nvfs: read: {e}");
				false
			}
		}
	}

	fn try_read(&self, handle: FileHandleId, dst: &mut [u8], start: u32, size: u32) -> Result<(), FsError> {
		let state = self.state.as_ref().ok_or(FsError::NotInstalled)?;
		let idx = *state.open_files.get(&handle).ok_or(FsError::UnknownHandle)?;
		let inode = state.inodes[idx as usize];
		let end = start.checked_add(size).ok_or(FsError::OutOfBounds)?;
		if end > inode.size || size as usize > dst.len() {
			return Err(FsError::OutOfBounds);
		}
		let offset = (state.header_len + inode.address + start) as usize;
		dst[..size as usize].copy_from_slice(state.image.slice(offset, size as usize));
		Ok(())
	}

	pub fn write(&mut self, handle: FileHandleId, src: &[u8], start: u32, size: u32) -> bool {
		match self.try_write(handle, src, start, size) {
			Ok(()) => true,
			Err(e) => {
				eprintln!("nvfs: write: {e}");
				false
			}
		}
	}

	fn try_write(&mut self, handle: FileHandleId, src: &[u8], start: u32, size: u32) -> Result<(), FsError> {
		let state = self.state.as_mut().ok_or(FsError::NotInstalled)?;
		let idx = *state.open_files.get(&handle).ok_or(FsError::UnknownHandle)?;
		let inode = state.inodes[idx as usize];
		let end = start.checked_add(size).ok_or(FsError::OutOfBounds)?;
		if end > inode.size || size as usize > src.len() {
			return Err(FsError::OutOfBounds);
		}
		let offset = (state.header_len + inode.address + start) as usize;
		state.image.slice_mut(offset, size as usize).copy_from_slice(&src[..size as usize]);
		Ok(())
	}

	// ---- enumeration and bookkeeping --------------------------------------

	pub fn enumerate_files_and_dirs(&self) -> EnumResult {
		let Some(state) = self.state.as_ref() else {
			eprintln!("nvfs: enumerate_files_and_dirs: {}", FsError::NotInstalled);
			return EnumResult::default();
		};
		let (_, _, folders, files) = state.read_dir_of(state.cur_dir);
		let folders = folders.iter().map(|f| dir::decode_name(&f.name)).collect();
		let files = files
			.iter()
			.filter_map(|f| {
				let inode = state.inodes[f.index_node_id as usize];
				if inode.owner_user_id == account::OWNER_ROOT || inode.owner_user_id == account::OWNER_NULL {
					None
				} else {
					Some(FileEntry {
						name: dir::decode_name(&f.name),
						owner: inode.owner_user_id,
						mode: AccessMode::from_bits(inode.access_mode),
						size: inode.size,
					})
				}
			})
			.collect();
		EnumResult { folders, files }
	}

	pub fn get_vdisk_capacity(&self) -> u32 {
		self.state.as_ref().map(|s| s.capacity).unwrap_or(0)
	}

	pub fn get_vdisk_free(&self) -> u32 {
		self.state.as_ref().map(|s| s.data_alloc.get_free()).unwrap_or(0)
	}

	pub fn get_vdisk_used(&self) -> u32 {
		self.get_vdisk_capacity() - self.get_vdisk_free()
	}
}

impl Drop for Engine {
	fn drop(&mut self) {
		if self.state.is_some() {
			self.uninstall_virtual_disk();
		}
	}
}

//! End-to-end scenarios driving a whole virtual disk lifecycle: create,
//! install, exercise the directory tree and open files, uninstall.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use nvfs::{AccessMode, DiskCapacity, Engine};

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// A scratch image path, unique per test, removed when the guard drops.
struct ScratchImage(PathBuf);

impl ScratchImage {
    fn new(name: &str) -> Self {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("nvfs-test-{}-{n}-{name}.img", std::process::id()));
        Self(path)
    }

    fn path(&self) -> &std::path::Path {
        &self.0
    }
}

impl Drop for ScratchImage {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[test]
fn create_install_round_trip() {
    let img = ScratchImage::new("roundtrip");
    assert!(Engine::create_virtual_disk(img.path(), DiskCapacity::Mb128));

    let mut engine = Engine::new();
    assert!(engine.install_virtual_disk(img.path()));
    assert_eq!(engine.get_vdisk_capacity(), 128 * 1024 * 1024);
    assert_eq!(engine.get_vdisk_used(), 0);
    let listing = engine.enumerate_files_and_dirs();
    assert!(listing.folders.is_empty());
    assert!(listing.files.is_empty());
}

#[test]
fn folder_and_file_lifecycle() {
    let img = ScratchImage::new("lifecycle");
    assert!(Engine::create_virtual_disk(img.path(), DiskCapacity::Mb128));

    let mut engine = Engine::new();
    assert!(engine.install_virtual_disk(img.path()));
    assert!(engine.login("GUEST", "GUEST666666"));

    assert!(engine.create_folder("docs"));
    assert!(!engine.create_folder("docs"), "duplicate name must be rejected");
    assert!(engine.create_file("readme.txt", 128, AccessMode::READ | AccessMode::WRITE));

    let listing = engine.enumerate_files_and_dirs();
    assert_eq!(listing.folders, vec!["docs".to_string()]);
    assert_eq!(listing.files.len(), 1);
    assert_eq!(listing.files[0].name, "readme.txt");
    assert_eq!(listing.files[0].size, 128);

    assert!(engine.set_working_dir("/docs"));
    assert_eq!(engine.get_working_dir(), "/docs");
    assert!(engine.create_file("notes.txt", 16, AccessMode::READ | AccessMode::WRITE));
    assert!(engine.set_working_dir("/"));

    let handle = engine.open_file("readme.txt").expect("file should open");
    assert!(engine.write(handle, b"hello, virtual disk", 0, 19));
    let mut buf = [0u8; 5];
    assert!(engine.read(handle, &mut buf, 0, buf.len() as u32));
    assert_eq!(&buf, b"hello");
    assert!(engine.close_file(handle));

    assert!(!engine.delete_folder("docs"), "folder still has a child file");
    assert!(engine.set_working_dir("/docs"));
    assert!(engine.delete_file("notes.txt"));
    assert!(engine.set_working_dir("/"));
    assert!(engine.delete_folder("docs"));

    assert!(engine.delete_file("readme.txt"));
    let listing = engine.enumerate_files_and_dirs();
    assert!(listing.folders.is_empty());
    assert!(listing.files.is_empty());
}

#[test]
fn cannot_delete_or_reopen_an_open_file() {
    let img = ScratchImage::new("openfile");
    assert!(Engine::create_virtual_disk(img.path(), DiskCapacity::Mb128));

    let mut engine = Engine::new();
    assert!(engine.install_virtual_disk(img.path()));
    assert!(engine.login("ROOT", "ROOT666666"));
    assert!(engine.create_file("locked.bin", 64, AccessMode::READ | AccessMode::WRITE));

    let handle = engine.open_file("locked.bin").unwrap();
    assert!(engine.open_file("locked.bin").is_none(), "second open must fail");
    assert!(!engine.delete_file("locked.bin"), "open file must not be deletable");

    assert!(engine.close_file(handle));
    assert!(engine.delete_file("locked.bin"));
}

#[test]
fn reads_and_writes_are_bounds_checked() {
    let img = ScratchImage::new("bounds");
    assert!(Engine::create_virtual_disk(img.path(), DiskCapacity::Mb128));

    let mut engine = Engine::new();
    assert!(engine.install_virtual_disk(img.path()));
    assert!(engine.login("ROOT", "ROOT666666"));
    assert!(engine.create_file("small.bin", 8, AccessMode::READ | AccessMode::WRITE));

    let handle = engine.open_file("small.bin").unwrap();
    let mut buf = [0u8; 9];
    assert!(!engine.read(handle, &mut buf, 0, 9), "read past end of file must fail");
    let payload = [1u8; 4];
    assert!(!engine.write(handle, &payload, 6, 4), "write past end of file must fail");
    assert!(engine.write(handle, &payload, 4, 4));
    assert!(engine.close_file(handle));
}

#[test]
fn name_validation_rejects_path_delimiters() {
    let img = ScratchImage::new("names");
    assert!(Engine::create_virtual_disk(img.path(), DiskCapacity::Mb128));

    let mut engine = Engine::new();
    assert!(engine.install_virtual_disk(img.path()));
    assert!(engine.login("ROOT", "ROOT666666"));

    assert!(!engine.create_folder("a/b"));
    assert!(!engine.create_folder("a\\b"));
    assert!(!engine.create_folder(""));
    assert!(!engine.create_file("x/y", 4, AccessMode::READ));
}

#[test]
fn working_directory_restores_on_failed_navigation() {
    let img = ScratchImage::new("cwd");
    assert!(Engine::create_virtual_disk(img.path(), DiskCapacity::Mb128));

    let mut engine = Engine::new();
    assert!(engine.install_virtual_disk(img.path()));
    assert!(engine.login("ROOT", "ROOT666666"));
    assert!(engine.create_folder("a"));
    assert!(engine.set_working_dir("/a"));
    assert_eq!(engine.get_working_dir(), "/a");

    assert!(!engine.set_working_dir("/a/does-not-exist"));
    assert_eq!(engine.get_working_dir(), "/a", "failed cd must not move the cursor");
}

#[test]
fn login_is_required_to_create_files_but_not_folders() {
    let img = ScratchImage::new("login");
    assert!(Engine::create_virtual_disk(img.path(), DiskCapacity::Mb128));

    let mut engine = Engine::new();
    assert!(engine.install_virtual_disk(img.path()));
    assert!(!engine.create_file("nope.txt", 4, AccessMode::READ));
    assert!(engine.create_folder("ok"));

    assert!(engine.login("GUEST", "GUEST666666"));
    assert!(engine.create_file("now.txt", 4, AccessMode::READ));
    engine.logout();
    assert!(!engine.create_file("after-logout.txt", 4, AccessMode::READ));
}

#[test]
fn uninstall_and_reinstall_preserve_contents() {
    let img = ScratchImage::new("persist");
    assert!(Engine::create_virtual_disk(img.path(), DiskCapacity::Mb128));

    {
        let mut engine = Engine::new();
        assert!(engine.install_virtual_disk(img.path()));
        assert!(engine.login("ROOT", "ROOT666666"));
        assert!(engine.create_folder("persisted"));
        assert!(engine.create_file("persisted.txt", 32, AccessMode::READ | AccessMode::WRITE));
        let handle = engine.open_file("persisted.txt").unwrap();
        assert!(engine.write(handle, b"still here", 0, 10));
        assert!(engine.close_file(handle));
        engine.uninstall_virtual_disk();
    }

    let mut engine = Engine::new();
    assert!(engine.install_virtual_disk(img.path()));
    let listing = engine.enumerate_files_and_dirs();
    assert_eq!(listing.folders, vec!["persisted".to_string()]);
    assert_eq!(listing.files[0].name, "persisted.txt");
    let handle = engine.open_file("persisted.txt").unwrap();
    let mut buf = [0u8; 10];
    assert!(engine.read(handle, &mut buf, 0, buf.len() as u32));
    assert_eq!(&buf, b"still here");
    assert!(engine.close_file(handle));
}

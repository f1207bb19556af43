//! `vfsh` logs into a virtual disk and drives it through an interactive
//! shell, in the same spirit as `login` handing off to an interactive
//! session once a user authenticates.

mod prompt;

use std::env;
use std::io;
use std::io::BufRead;
use std::io::Write;
use std::path::PathBuf;
use std::process::exit;

use nvfs::{AccessMode, ByteSize, Engine};
use prompt::prompt;

fn print_usage(prog: &str) {
	eprintln!("usage: {prog} IMAGE");
}

fn main() {
	let mut args = env::args();
	let prog = args.next().unwrap_or("vfsh".to_owned());
	let image_path = args.next().map(PathBuf::from).unwrap_or_else(|| {
		eprintln!("{prog}: specify the path of a virtual disk image");
		print_usage(&prog);
		exit(1);
	});

	let mut engine = Engine::new();
	if !engine.install_virtual_disk(&image_path) {
		eprintln!("{prog}: could not install {}", image_path.display());
		exit(1);
	}

	loop {
		println!();
		let login = match prompt(Some("login: "), false) {
			Some(l) => l,
			None => break,
		};
		let pass = match prompt(None, true) {
			Some(p) => p,
			None => break,
		};

		if engine.login(&login, &pass) {
			run_shell(&mut engine);
			engine.logout();
		} else {
			eprintln!("Login incorrect");
		}
	}

	engine.uninstall_virtual_disk();
}

/// Runs the interactive command loop until `exit`/`logout`/EOF.
fn run_shell(engine: &mut Engine) {
	let stdin = io::stdin();
	loop {
		print!("{} $ ", engine.get_working_dir());
		let _ = io::stdout().flush();

		let mut line = String::new();
		if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
			println!();
			return;
		}
		let mut parts = line.split_whitespace();
		let Some(cmd) = parts.next() else { continue };
		let rest: Vec<&str> = parts.collect();

		match cmd {
			"exit" | "quit" => return,
			"logout" => return,
			"pwd" => println!("{}", engine.get_working_dir()),
			"cd" => match rest.first() {
				Some(path) => {
					engine.set_working_dir(path);
				},
				None => eprintln!("cd: missing path"),
			},
			"ls" => cmd_ls(engine),
			"mkdir" => match rest.first() {
				Some(name) => {
					engine.create_folder(name);
				},
				None => eprintln!("mkdir: missing name"),
			},
			"rmdir" => match rest.first() {
				Some(name) => {
					engine.delete_folder(name);
				},
				None => eprintln!("rmdir: missing name"),
			},
			"touch" => cmd_touch(engine, &rest),
			"rm" => match rest.first() {
				Some(name) => {
					engine.delete_file(name);
				},
				None => eprintln!("rm: missing name"),
			},
			"cat" => match rest.first() {
				Some(name) => cmd_cat(engine, name),
				None => eprintln!("cat: missing name"),
			},
			"write" => cmd_write(engine, &rest),
			"df" => cmd_df(engine),
			"help" => print_help(),
			"" => {},
			_ => eprintln!("{cmd}: unknown command (try `help`)"),
		}
	}
}

fn cmd_ls(engine: &Engine) {
	let listing = engine.enumerate_files_and_dirs();
	for folder in &listing.folders {
		println!("{folder}/");
	}
	for file in &listing.files {
		println!("{}\t{}", file.name, ByteSize(file.size as u64));
	}
}

fn cmd_touch(engine: &mut Engine, rest: &[&str]) {
	let Some(name) = rest.first() else {
		eprintln!("touch: missing name");
		return;
	};
	let size: u32 = rest.get(1).and_then(|s| s.parse().ok()).unwrap_or(4096);
	engine.create_file(name, size, AccessMode::READ | AccessMode::WRITE);
}

fn cmd_cat(engine: &mut Engine, name: &str) {
	let Some(handle) = engine.open_file(name) else {
		return;
	};
	let listing = engine.enumerate_files_and_dirs();
	let Some(entry) = listing.files.iter().find(|f| f.name == name) else {
		engine.close_file(handle);
		return;
	};
	let size = entry.size;
	let mut buf = vec![0u8; size as usize];
	if engine.read(handle, &mut buf, 0, size) {
		print!("{}", String::from_utf8_lossy(&buf));
	}
	engine.close_file(handle);
}

fn cmd_write(engine: &mut Engine, rest: &[&str]) {
	let [name, offset, text @ ..] = rest else {
		eprintln!("write: usage: write NAME OFFSET TEXT...");
		return;
	};
	let Ok(offset) = offset.parse::<u32>() else {
		eprintln!("write: invalid offset `{offset}`");
		return;
	};
	let Some(handle) = engine.open_file(name) else {
		return;
	};
	let payload = text.join(" ");
	let len = payload.len() as u32;
	engine.write(handle, payload.as_bytes(), offset, len);
	engine.close_file(handle);
}

fn cmd_df(engine: &Engine) {
	let capacity = engine.get_vdisk_capacity() as u64;
	let used = engine.get_vdisk_used() as u64;
	let free = engine.get_vdisk_free() as u64;
	println!("capacity {}  used {}  free {}", ByteSize(capacity), ByteSize(used), ByteSize(free));
}

fn print_help() {
	println!("commands: cd pwd ls mkdir rmdir touch rm cat write df logout exit help");
}

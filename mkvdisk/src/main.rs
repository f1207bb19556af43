//! The `mkvdisk` tool creates a fresh virtual disk image file.

use std::env;
use std::path::PathBuf;
use std::process::exit;

use nvfs::{ByteSize, DiskCapacity, Engine};

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
	/// The name of the current program used in command line.
	prog: String,

	/// If true, print command line help.
	help: bool,

	/// The requested capacity preset.
	capacity: Option<String>,

	/// The path at which the image file will be created.
	image_path: Option<PathBuf>,
}

fn parse_args() -> Args {
	let mut args: Args = Default::default();
	let mut iter = env::args();

	args.prog = iter.next().unwrap_or("mkvdisk".to_owned());

	while let Some(arg) = iter.next() {
		match arg.as_str() {
			"-h" | "--help" => args.help = true,

			"-s" | "--size" => {
				args.capacity = iter.next();
			},

			_ => {
				args.image_path = Some(PathBuf::from(arg));
			},
		}
	}

	args
}

fn print_usage(prog: &str) {
	eprintln!("usage: {prog} [-s SIZE] IMAGE");
	eprintln!();
	eprintln!("Creates a fresh virtual disk image at the given path.");
	eprintln!();
	eprintln!("SIZE is one of: 128M, 256M, 512M, 1G (default: 256M)");
}

fn parse_capacity(prog: &str, raw: &str) -> DiskCapacity {
	match raw {
		"128M" => DiskCapacity::Mb128,
		"256M" => DiskCapacity::Mb256,
		"512M" => DiskCapacity::Mb512,
		"1G" => DiskCapacity::Gb1,
		_ => {
			eprintln!("{prog}: invalid size `{raw}`");
			exit(1);
		},
	}
}

fn main() {
	let args = parse_args();

	if args.help {
		print_usage(&args.prog);
		return;
	}

	let image_path = args.image_path.unwrap_or_else(|| {
		eprintln!("{}: specify a path for the new image", args.prog);
		print_usage(&args.prog);
		exit(1);
	});

	let capacity = match args.capacity {
		Some(raw) => parse_capacity(&args.prog, &raw),
		None => DiskCapacity::Mb256,
	};

	if !Engine::create_virtual_disk(&image_path, capacity) {
		eprintln!("{}: failed to create {}", args.prog, image_path.display());
		exit(1);
	}

	println!("created {} ({})", image_path.display(), ByteSize(capacity.bytes() as u64));
}

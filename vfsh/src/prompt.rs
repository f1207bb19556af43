//! Line prompting, with optional hidden input for passwords.

use libc::tcgetattr;
use libc::tcsetattr;
use libc::termios;
use libc::ECHO;
use libc::ECHOE;
use libc::ICANON;
use libc::STDIN_FILENO;
use libc::TCSANOW;
use std::io;
use std::io::BufRead;
use std::io::Write;
use std::mem::MaybeUninit;

/// Shows a prompt and returns when a newline is received, or `None` on EOF.
///
/// `hidden` disables terminal echo for the duration of the read, for
/// password entry.
pub fn prompt(prompt: Option<&str>, hidden: bool) -> Option<String> {
	let prompt = prompt.unwrap_or("Password: ");

	let saved_termios = unsafe {
		let mut t: termios = MaybeUninit::zeroed().assume_init();
		tcgetattr(STDIN_FILENO, &mut t);
		t
	};

	if hidden {
		let mut termios = saved_termios.clone();
		termios.c_lflag &= !(ICANON | ECHO | ECHOE);
		unsafe {
			tcsetattr(STDIN_FILENO, TCSANOW, &termios);
		}
	}

	print!("{prompt}");
	let _ = io::stdout().flush();

	let input = io::stdin().lock().lines().next()?.unwrap_or_default();

	if hidden {
		println!();
		unsafe {
			tcsetattr(STDIN_FILENO, TCSANOW, &saved_termios);
		}
	}

	Some(input)
}

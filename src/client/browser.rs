//! Best-effort system browser launcher.
//!
//! Opening the login URL must never be fatal: on any failure the caller
//! prints the URL instead. Launcher output is suppressed so that xdg-open
//! noise does not end up in the user's terminal.

use std::{
    io,
    process::{Command, Stdio},
};

#[cfg(target_os = "macos")]
pub(crate) fn open_url(url: &str) -> io::Result<()> {
    spawn(Command::new("open").arg(url))
}

#[cfg(target_os = "windows")]
pub(crate) fn open_url(url: &str) -> io::Result<()> {
    spawn(Command::new("cmd").args(["/C", "start", "", url]))
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub(crate) fn open_url(url: &str) -> io::Result<()> {
    spawn(Command::new("xdg-open").arg(url))
}

fn spawn(command: &mut Command) -> io::Result<()> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(drop)
}

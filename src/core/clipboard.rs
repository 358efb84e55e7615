//! Best-effort clipboard support via external tools.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Candidate commands in preference order, with the args each needs.
const TOOLS: &[(&str, &[&str])] = &[
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
    ("clip", &[]),
];

/// Copy `text` to the system clipboard, returning the tool used.
pub fn copy(text: &str) -> Result<&'static str> {
    for (tool, args) in TOOLS {
        if which::which(tool).is_err() {
            continue;
        }
        let mut child = Command::new(tool)
            .args(*args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(text.as_bytes())?;
        }
        let status = child.wait()?;
        if status.success() {
            return Ok(tool);
        }
    }
    Err(Error::Other(
        "no clipboard tool found (tried pbcopy, wl-copy, xclip, xsel, clip)".to_string(),
    ))
}

/// Whether any supported clipboard tool is installed.
pub fn available() -> bool {
    TOOLS.iter().any(|(tool, _)| which::which(tool).is_ok())
}

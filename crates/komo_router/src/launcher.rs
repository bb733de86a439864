//! App-launch intents and the process launcher seam.

use std::io;
use std::process::{Command, Stdio};

use komo_core::{normalize_input, AppEntry};
use tracing::debug;

/// Starts external commands without waiting for them.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, command: &str) -> io::Result<()>;
}

/// Runs commands through the platform shell, detached from our stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellLauncher;

impl ShellLauncher {
    fn shell_command(command: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }
}

impl ProcessLauncher for ShellLauncher {
    fn launch(&self, command: &str) -> io::Result<()> {
        let mut child = Self::shell_command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        debug!("Launched '{}' (pid {})", command, child.id());

        // Reap the child so it does not linger as a zombie
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

/// First app whose name followed by a launch suffix occurs in `normalized`.
pub fn match_app<'a, S: AsRef<str>>(
    apps: &'a [AppEntry],
    suffixes: &[S],
    normalized: &str,
) -> Option<&'a AppEntry> {
    apps.iter().find(|app| {
        let name = normalize_input(&app.name);
        !name.is_empty()
            && suffixes
                .iter()
                .any(|suffix| normalized.contains(&format!("{}{}", name, suffix.as_ref())))
    })
}

//! Sign-in material for the edX account driving the run.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::theme;

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// Keep the password out of debug output.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Gather credentials: environment first, interactive prompt otherwise.
///
/// `EDX_ROSTER_USERNAME` / `EDX_ROSTER_PASSWORD` suit unattended runs; the
/// prompt never echoes the password.
pub fn gather() -> Result<Credentials> {
    if let (Ok(username), Ok(password)) = (
        std::env::var("EDX_ROSTER_USERNAME"),
        std::env::var("EDX_ROSTER_PASSWORD"),
    ) {
        if !username.is_empty() && !password.is_empty() {
            debug!(username, "using credentials from environment");
            return Ok(Credentials { username, password });
        }
    }

    println!(
        "{}",
        theme::muted("The signed-in account must hold Admin on every course in the file.")
    );
    print!("Username: ");
    io::stdout().flush().context("could not flush stdout")?;

    let mut username = String::new();
    io::stdin()
        .lock()
        .read_line(&mut username)
        .context("could not read username")?;
    let username = username.trim().to_string();
    if username.is_empty() {
        bail!("no username given");
    }

    let password = rpassword::prompt_password("Password: ").context("could not read password")?;
    if password.is_empty() {
        bail!("no password given");
    }

    Ok(Credentials { username, password })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_leaks_the_password() {
        let creds = Credentials {
            username: "coursestaff@example.edu".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("coursestaff@example.edu"));
        assert!(!rendered.contains("hunter2"));
    }
}

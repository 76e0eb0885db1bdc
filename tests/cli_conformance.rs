//! CLI conformance tests.
//!
//! Exercises the binary's argument handling and early failure paths: the
//! ones that must resolve before any credentials are prompted for or any
//! browser is launched.

use std::process::Command;

/// Run the built binary and get its exit code.
fn exit_code(args: &[&str]) -> i32 {
    let output = Command::new(env!("CARGO_BIN_EXE_edx-roster"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to execute edx-roster");

    output.status.code().unwrap_or(-1)
}

fn stderr_of(args: &[&str]) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_edx-roster"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to execute edx-roster");
    String::from_utf8_lossy(&output.stderr).into_owned()
}

mod success_codes {
    use super::*;

    #[test]
    fn help_exits_zero() {
        assert_eq!(exit_code(&["--help"]), 0);
    }

    #[test]
    fn version_exits_zero() {
        assert_eq!(exit_code(&["--version"]), 0);
    }
}

mod usage_errors {
    use super::*;

    #[test]
    fn missing_csvfile_exits_nonzero() {
        let code = exit_code(&[]);
        assert_ne!(code, 0, "missing required argument should fail");
        // clap returns 2 for usage errors
        assert_eq!(code, 2);
    }

    #[test]
    fn unknown_flag_exits_nonzero() {
        assert_ne!(exit_code(&["--definitely-not-a-flag", "roster.csv"]), 0);
    }

    #[test]
    fn firefox_is_not_offered() {
        // The CDP stack only drives Chromium-family browsers.
        assert_ne!(exit_code(&["--browser", "firefox", "roster.csv"]), 0);
    }
}

mod early_failures {
    use super::*;

    #[test]
    fn nonexistent_roster_fails_before_any_prompt() {
        // Must fail fast on the file, never reach the credential prompt.
        let code = exit_code(&["/nonexistent/roster.csv"]);
        assert_eq!(code, 1);
        let stderr = stderr_of(&["/nonexistent/roster.csv"]);
        assert!(
            stderr.contains("/nonexistent/roster.csv"),
            "error should name the missing file, got: {stderr}"
        );
    }

    #[test]
    fn roster_missing_columns_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "Course,URL\nx,y\n").unwrap();

        let path = path.to_str().unwrap();
        assert_eq!(exit_code(&[path]), 1);
        let stderr = stderr_of(&[path]);
        assert!(stderr.contains("Add"), "error should name the missing column");
    }
}

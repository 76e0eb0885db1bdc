use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

/// Bulk-edit edX course team rosters from a CSV by driving a browser.
///
/// The input CSV must have these headers/columns:
///   Course  - course name or identifier (optional)
///   URL     - the address of the class' Course Team Settings page
///   Add     - e-mail addresses of staff to be added (not usernames),
///             space-separated when there are several
///   Promote - promote these people to Admin status
///   Remove  - just like Add
///   Demote  - removes Admin status
///
/// The signed-in account must hold Admin on every course in the file.
#[derive(Debug, Clone, Parser)]
#[command(name = "edx-roster", version, about, verbatim_doc_comment)]
pub struct Cli {
    /// Input roster CSV
    #[arg(value_name = "CSVFILE")]
    pub csvfile: PathBuf,

    /// List each course's current team instead of editing it
    #[arg(long)]
    pub list: bool,

    /// Which Chromium-family browser to drive
    #[arg(long, value_enum, default_value_t = BrowserKind::Chrome)]
    pub browser: BrowserKind,

    /// Explicit browser executable (skips --browser discovery)
    #[arg(
        long = "browser-path",
        value_name = "PATH",
        env = "EDX_ROSTER_BROWSER_PATH"
    )]
    pub browser_path: Option<PathBuf>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub visible: bool,

    /// Only process courses from this org (the ORG of course-v1:ORG+COURSE+RUN)
    #[arg(long, value_name = "ORG")]
    pub family: Option<String>,

    /// Where to write the output CSV (default depends on mode)
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Path to a config.toml file
    #[arg(short = 'c', long, value_name = "PATH", env = "EDX_ROSTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable coloured terminal output
    #[arg(long = "no-color", action = ArgAction::SetTrue)]
    pub no_color: bool,
}

/// Chromium-family browsers the CDP stack can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BrowserKind {
    Chrome,
    Chromium,
    Edge,
}

impl BrowserKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Chromium => "chromium",
            Self::Edge => "edge",
        }
    }

    /// Binary names to try on PATH, most specific first.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Self::Chrome => &[
                "google-chrome",
                "google-chrome-stable",
                "chrome",
                "chromium",
                "chromium-browser",
            ],
            Self::Chromium => &["chromium", "chromium-browser", "chromium-freeworld"],
            Self::Edge => &["microsoft-edge", "microsoft-edge-stable", "msedge"],
        }
    }
}

//! The run loop: strictly sequential, one course, one operation, one
//! address at a time, with a per-course skip-and-continue fault model.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::args::Cli;
use crate::browser::{LaunchOptions, Session};
use crate::config::Config;
use crate::credentials::{self, Credentials};
use crate::roster::{self, CourseRow, Operation, StaffingRow};
use crate::team::{Member, OpOutcome, TeamPage};
use crate::theme;

/// Entry point after CLI parsing and config load.
pub async fn run(cli: &Cli, config: &Config) -> Result<()> {
    // Read and filter the roster before prompting or launching anything:
    // a bad file should fail in milliseconds, not after sign-in.
    let rows = roster::read_roster(&cli.csvfile)?;
    let rows = filter_family(rows, cli.family.as_deref());
    if rows.is_empty() {
        warn!("no courses to process");
        return Ok(());
    }
    info!(courses = rows.len(), list_mode = cli.list, "roster loaded");

    let creds = credentials::gather()?;

    let session = Session::launch(&LaunchOptions {
        kind: cli.browser,
        executable: cli.browser_path.clone(),
        visible: cli.visible,
    })
    .await?;

    let result = drive(&session, &creds, &rows, cli, config).await;
    session.shutdown().await;
    result
}

/// Keep only rows whose course org matches the requested family.
fn filter_family(rows: Vec<CourseRow>, family: Option<&str>) -> Vec<CourseRow> {
    let Some(family) = family else {
        return rows;
    };
    let total = rows.len();
    let kept: Vec<CourseRow> = rows
        .into_iter()
        .filter(|row| match row.org() {
            Some(org) => org.eq_ignore_ascii_case(family),
            None => {
                warn!(course = row.label(), "row has no parsable course key, excluded by --family");
                false
            }
        })
        .collect();
    info!(family, kept = kept.len(), dropped = total - kept.len(), "family filter applied");
    kept
}

async fn drive(
    session: &Session,
    creds: &Credentials,
    rows: &[CourseRow],
    cli: &Cli,
    config: &Config,
) -> Result<()> {
    let team = TeamPage::new(session.page(), config);

    let sp = theme::spinner("Signing in to edX");
    match team.sign_in(&config.login_url, creds).await {
        Ok(()) => theme::spinner_ok(&sp, "Signed in"),
        Err(err) => {
            theme::spinner_fail(&sp, "Sign-in failed");
            return Err(err).context("could not sign in to edX");
        }
    }

    if cli.list {
        run_list(&team, rows, cli, config).await
    } else {
        run_edit(&team, rows, cli, config).await
    }
}

// ── Edit mode ───────────────────────────────────────────────────────────────

/// The addresses one course page refused to process, by operation.
#[derive(Debug, Default)]
struct RowFailures {
    add: Vec<String>,
    promote: Vec<String>,
    remove: Vec<String>,
    demote: Vec<String>,
}

impl RowFailures {
    fn push(&mut self, op: Operation, email: &str) {
        let list = match op {
            Operation::Add => &mut self.add,
            Operation::Promote => &mut self.promote,
            Operation::Remove => &mut self.remove,
            Operation::Demote => &mut self.demote,
        };
        list.push(email.to_string());
    }

    fn count(&self) -> usize {
        self.add.len() + self.promote.len() + self.remove.len() + self.demote.len()
    }

    fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Rebuild an input-shaped row holding only what still needs doing,
    /// so the output file can be re-run as-is.
    fn into_row(self, source: &CourseRow) -> CourseRow {
        CourseRow {
            course: source.course.clone(),
            url: source.url.clone(),
            add: self.add.join(" "),
            promote: self.promote.join(" "),
            remove: self.remove.join(" "),
            demote: self.demote.join(" "),
        }
    }
}

async fn run_edit(
    team: &TeamPage<'_>,
    rows: &[CourseRow],
    cli: &Cli,
    config: &Config,
) -> Result<()> {
    let mut remaining: Vec<CourseRow> = Vec::new();
    let mut processed = 0usize;
    let mut failed_addresses = 0usize;

    for (index, row) in rows.iter().enumerate() {
        info!(
            course = row.label(),
            position = index + 1,
            total = rows.len(),
            "processing course"
        );

        if row.url().is_empty() {
            warn!(course = row.label(), "row has no URL, skipping");
            remaining.push(row.clone());
            continue;
        }

        if let Err(err) = team.open_course(row.url()).await {
            warn!(course = row.label(), error = %err, "could not open course team page, skipping");
            remaining.push(row.clone());
            continue;
        }

        processed += 1;
        let failures = apply_row(team, row, config).await;
        if !failures.is_empty() {
            failed_addresses += failures.count();
            remaining.push(failures.into_row(row));
        }
    }

    if remaining.is_empty() {
        info!(courses = processed, "successful in all courses");
        println!("{}", theme::icon_ok(&format!("Successful in all {processed} courses.")));
        return Ok(());
    }

    let path = output_path(cli, &config.remaining_csv);
    roster::write_remaining(&path, &remaining)?;
    warn!(
        courses = processed,
        skipped = rows.len() - processed,
        failed_addresses,
        output = %path.display(),
        "run finished with leftovers"
    );
    println!(
        "{}",
        theme::warn(&format!(
            "{} of {} courses need another pass; see {}",
            remaining.len(),
            rows.len(),
            path.display()
        ))
    );
    Ok(())
}

/// Run the four operations over one opened course page, in fixed order.
async fn apply_row(team: &TeamPage<'_>, row: &CourseRow, config: &Config) -> RowFailures {
    let mut failures = RowFailures::default();

    for op in Operation::ALL {
        let emails = row.emails(op);
        if emails.is_empty() {
            continue;
        }

        for email in &emails {
            let result = match op {
                Operation::Add => team.add_member(email).await,
                Operation::Promote => team.promote_member(email).await,
                Operation::Remove => team.remove_member(email).await,
                Operation::Demote => team.demote_member(email).await,
            };
            match result {
                Ok(OpOutcome::Applied) => {
                    info!(email, op = op.as_str(), "done");
                }
                Ok(OpOutcome::AlreadySatisfied) => {
                    info!(email, op = op.as_str(), "nothing to do");
                }
                Ok(OpOutcome::UnknownAddress) | Ok(OpOutcome::NotMember) => {
                    failures.push(op, email);
                }
                Err(err) => {
                    warn!(email, op = op.as_str(), error = %err, "giving up on this address");
                    failures.push(op, email);
                }
            }
        }

        // The page falls behind rapid-fire gestures; skipping this pause
        // used to silently drop entire address lists.
        tokio::time::sleep(config.op_pacing()).await;
    }

    failures
}

// ── List mode ───────────────────────────────────────────────────────────────

fn staffing_row(row: &CourseRow, members: &[Member]) -> StaffingRow {
    let (admins, staff): (Vec<&Member>, Vec<&Member>) =
        members.iter().partition(|m| m.admin);
    let join = |list: Vec<&Member>| {
        list.iter()
            .map(|m| m.email.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    };
    StaffingRow {
        course: row.course.clone(),
        url: row.url().to_string(),
        admin: join(admins),
        staff: join(staff),
    }
}

async fn run_list(
    team: &TeamPage<'_>,
    rows: &[CourseRow],
    cli: &Cli,
    config: &Config,
) -> Result<()> {
    let mut staffing: Vec<StaffingRow> = Vec::new();
    let mut remaining: Vec<CourseRow> = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        info!(
            course = row.label(),
            position = index + 1,
            total = rows.len(),
            "listing course team"
        );

        if row.url().is_empty() {
            warn!(course = row.label(), "row has no URL, skipping");
            remaining.push(row.clone());
            continue;
        }

        if let Err(err) = team.open_course(row.url()).await {
            warn!(course = row.label(), error = %err, "could not open course team page, skipping");
            remaining.push(row.clone());
            continue;
        }

        match team.list_members().await {
            Ok(members) => {
                info!(course = row.label(), members = members.len(), "team scraped");
                staffing.push(staffing_row(row, &members));
            }
            Err(err) => {
                warn!(course = row.label(), error = %err, "could not scrape team, skipping");
                remaining.push(row.clone());
            }
        }
    }

    let path = output_path(cli, &config.staffing_csv);
    roster::write_staffing(&path, &staffing)?;
    info!(courses = staffing.len(), output = %path.display(), "staffing CSV written");
    println!(
        "{}",
        theme::icon_ok(&format!("Wrote staffing for {} courses to {}", staffing.len(), path.display()))
    );

    if !remaining.is_empty() {
        roster::write_remaining(&config.remaining_csv, &remaining)?;
        warn!(
            skipped = remaining.len(),
            output = %config.remaining_csv.display(),
            "some courses could not be listed"
        );
    }
    Ok(())
}

fn output_path(cli: &Cli, default: &Path) -> PathBuf {
    cli.output.clone().unwrap_or_else(|| default.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(course: &str, url: &str) -> CourseRow {
        CourseRow {
            course: course.into(),
            url: url.into(),
            ..CourseRow::default()
        }
    }

    #[test]
    fn family_filter_matches_org_case_insensitively() {
        let rows = vec![
            row("a", "https://studio.edx.org/course_team/course-v1:HarvardX+A+1"),
            row("b", "https://studio.edx.org/course_team/course-v1:MITx+B+1"),
            row("c", "https://example.org/not-a-course"),
        ];
        let kept = filter_family(rows, Some("harvardx"));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].course, "a");
    }

    #[test]
    fn no_filter_keeps_everything() {
        let rows = vec![row("a", "x"), row("b", "y")];
        assert_eq!(filter_family(rows, None).len(), 2);
    }

    #[test]
    fn failures_rebuild_a_rerunnable_row() {
        let source = CourseRow {
            course: "PH125".into(),
            url: "https://example.org/team".into(),
            add: "a@x.edu b@x.edu".into(),
            remove: "old@x.edu".into(),
            ..CourseRow::default()
        };
        let mut failures = RowFailures::default();
        failures.push(Operation::Add, "b@x.edu");
        failures.push(Operation::Demote, "boss@x.edu");
        assert_eq!(failures.count(), 2);

        let rebuilt = failures.into_row(&source);
        assert_eq!(rebuilt.course, "PH125");
        assert_eq!(rebuilt.add, "b@x.edu");
        // Succeeded columns come out empty, not copied from the input.
        assert_eq!(rebuilt.remove, "");
        assert_eq!(rebuilt.demote, "boss@x.edu");
    }

    #[test]
    fn staffing_rows_partition_by_role() {
        let members = vec![
            Member { email: "boss@x.edu".into(), admin: true },
            Member { email: "a@x.edu".into(), admin: false },
            Member { email: "b@x.edu".into(), admin: false },
        ];
        let staffing = staffing_row(&row("PH125", "https://example.org/team"), &members);
        assert_eq!(staffing.admin, "boss@x.edu");
        assert_eq!(staffing.staff, "a@x.edu b@x.edu");
    }
}

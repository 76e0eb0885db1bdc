//! Roster CSV input and the two output reports.
//!
//! The input is flat: one row per course, four whitespace-separated e-mail
//! lists. The remaining-courses output reuses the input columns so a failed
//! run's output can be fed straight back in as the next run's input.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// The four roster operations, in the order they run on each course page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Promote,
    Remove,
    Demote,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Add,
        Operation::Promote,
        Operation::Remove,
        Operation::Demote,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Promote => "promote",
            Self::Remove => "remove",
            Self::Demote => "demote",
        }
    }
}

/// One input row: a course and the addresses to add/promote/remove/demote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRow {
    #[serde(rename = "Course", default)]
    pub course: String,
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(rename = "Add", default)]
    pub add: String,
    #[serde(rename = "Promote", default)]
    pub promote: String,
    #[serde(rename = "Remove", default)]
    pub remove: String,
    #[serde(rename = "Demote", default)]
    pub demote: String,
}

impl CourseRow {
    /// The team-page address, trimmed of spreadsheet whitespace.
    pub fn url(&self) -> &str {
        self.url.trim()
    }

    /// Something to call this course in logs: the label if present, else the URL.
    pub fn label(&self) -> &str {
        let course = self.course.trim();
        if course.is_empty() { self.url() } else { course }
    }

    /// The parsed addresses for one operation column.
    pub fn emails(&self, op: Operation) -> Vec<String> {
        let cell = match op {
            Operation::Add => &self.add,
            Operation::Promote => &self.promote,
            Operation::Remove => &self.remove,
            Operation::Demote => &self.demote,
        };
        split_emails(cell)
    }

    /// The organization of this row's course key, when the URL carries one.
    pub fn org(&self) -> Option<String> {
        course_org(self.url())
    }
}

/// Split a spreadsheet cell into addresses: whitespace-separated, blanks dropped.
pub fn split_emails(cell: &str) -> Vec<String> {
    cell.split_whitespace().map(str::to_string).collect()
}

/// Extract the ORG of a `course-v1:ORG+COURSE+RUN` key from a team-page URL.
///
/// Studio percent-encodes the `+` separators in some generations of the UI.
pub fn course_org(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url.trim()).ok()?;
    for segment in parsed.path_segments()? {
        let segment = segment.replace("%2B", "+").replace("%2b", "+");
        if let Some(key) = segment.strip_prefix("course-v1:") {
            let org = key.split('+').next()?;
            if !org.is_empty() {
                return Some(org.to_string());
            }
        }
    }
    None
}

const REQUIRED_HEADERS: [&str; 5] = ["URL", "Add", "Promote", "Remove", "Demote"];

/// Read the input roster. Header problems fail here, before the browser
/// ever launches; a bad row reports its 1-based file line.
pub fn read_roster(path: &Path) -> Result<Vec<CourseRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("could not open roster {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("roster {} has no header row", path.display()))?
        .clone();
    for required in REQUIRED_HEADERS {
        if !headers.iter().any(|h| h == required) {
            bail!(
                "roster {} is missing the {:?} column (found: {})",
                path.display(),
                required,
                headers.iter().collect::<Vec<_>>().join(", ")
            );
        }
    }

    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<CourseRow>().enumerate() {
        let row = record.with_context(|| {
            format!("bad row at line {} of {}", index + 2, path.display())
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// One `--list` output row: who currently staffs a course, by role.
#[derive(Debug, Clone, Serialize)]
pub struct StaffingRow {
    #[serde(rename = "Course")]
    pub course: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Admin")]
    pub admin: String,
    #[serde(rename = "Staff")]
    pub staff: String,
}

/// Write the remaining-courses CSV (same columns as the input).
pub fn write_remaining(path: &Path, rows: &[CourseRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("could not create {}", path.display()))?;
    // serialize() only emits the header alongside a row; an empty report
    // still gets one.
    if rows.is_empty() {
        writer.write_record(["Course", "URL", "Add", "Promote", "Remove", "Demote"])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().context("could not flush output CSV")?;
    Ok(())
}

/// Write the `--list` staffing CSV.
pub fn write_staffing(path: &Path, rows: &[StaffingRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("could not create {}", path.display()))?;
    if rows.is_empty() {
        writer.write_record(["Course", "URL", "Admin", "Staff"])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().context("could not flush output CSV")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Course,URL,Add,Promote,Remove,Demote
PH125,https://studio.edx.org/course_team/course-v1:HarvardX+PH125+2024,a@x.edu b@x.edu,,old@x.edu,
,https://studio.edx.org/course_team/course-v1:MITx+6002+2024,,boss@x.edu,,
";

    fn write_sample(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("roster.csv");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn reads_rows_and_splits_addresses() {
        let dir = tempfile::tempdir().unwrap();
        let rows = read_roster(&write_sample(&dir, SAMPLE)).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].label(), "PH125");
        assert_eq!(rows[0].emails(Operation::Add), vec!["a@x.edu", "b@x.edu"]);
        assert_eq!(rows[0].emails(Operation::Remove), vec!["old@x.edu"]);
        assert!(rows[0].emails(Operation::Promote).is_empty());

        // Course label is optional; the URL stands in.
        assert!(rows[1].label().contains("MITx"));
        assert_eq!(rows[1].emails(Operation::Promote), vec!["boss@x.edu"]);
    }

    #[test]
    fn missing_column_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(&dir, "Course,URL,Add\nx,y,z\n");
        let err = read_roster(&path).unwrap_err();
        assert!(err.to_string().contains("Promote"));
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = read_roster(Path::new("/nonexistent/roster.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/roster.csv"));
    }

    #[test]
    fn split_emails_drops_blanks() {
        assert_eq!(split_emails("  a@x.edu   b@x.edu "), vec!["a@x.edu", "b@x.edu"]);
        assert!(split_emails("").is_empty());
        assert!(split_emails("   ").is_empty());
    }

    #[test]
    fn course_org_from_plain_and_encoded_urls() {
        assert_eq!(
            course_org("https://studio.edx.org/course_team/course-v1:HarvardX+PH125+2024"),
            Some("HarvardX".to_string())
        );
        assert_eq!(
            course_org("https://course-authoring.edx.org/course/course-v1:MITx%2B6002%2B2024/course_team"),
            Some("MITx".to_string())
        );
        assert_eq!(course_org("https://example.org/no/key/here"), None);
        assert_eq!(course_org("not a url"), None);
    }

    #[test]
    fn remaining_csv_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remaining.csv");
        let rows = vec![CourseRow {
            course: "PH125".into(),
            url: "https://example.org/team".into(),
            add: "a@x.edu".into(),
            ..CourseRow::default()
        }];
        write_remaining(&path, &rows).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("Course,URL,Add,Promote,Remove,Demote"));
        let reread = read_roster(&path).unwrap();
        assert_eq!(reread, rows);
    }

    #[test]
    fn staffing_csv_has_the_four_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staffing.csv");
        write_staffing(
            &path,
            &[StaffingRow {
                course: "PH125".into(),
                url: "https://example.org/team".into(),
                admin: "boss@x.edu".into(),
                staff: "a@x.edu b@x.edu".into(),
            }],
        )
        .unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("Course,URL,Admin,Staff"));
        assert!(written.contains("a@x.edu b@x.edu"));
    }
}

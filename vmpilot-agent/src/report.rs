//! Markdown report of researched companies and their contact info

use crate::research::{Company, ContactInfo};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use vmpilot_error::{Error, Result};

pub const DEFAULT_TITLE: &str = "YC W25 Company Contact Information";

/// Writes one report file per call, never overwriting an earlier one
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    title: String,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            title: DEFAULT_TITLE.to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the report and return its path.
    ///
    /// Companies are paired with `contacts` by position; a company without a
    /// matching slot is reported as failed.
    pub fn write(&self, companies: &[Company], contacts: &[Option<ContactInfo>]) -> Result<PathBuf> {
        self.write_at(Local::now(), companies, contacts)
    }

    pub fn write_at(
        &self,
        now: DateTime<Local>,
        companies: &[Company],
        contacts: &[Option<ContactInfo>],
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::from(e)
                .with_operation("report::write")
                .with_context("dir", self.dir.display().to_string())
        })?;

        let body = render(&self.title, now, companies, contacts);
        let stem = format!("contact_info_{}", now.format("%Y%m%d_%H%M%S"));

        let mut attempt = 0usize;
        loop {
            let name = if attempt == 0 {
                format!("{}.md", stem)
            } else {
                format!("{}_{}.md", stem, attempt)
            };
            let path = self.dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(body.as_bytes()).map_err(|e| {
                        Error::from(e).with_operation("report::write").with_context("path", path.display().to_string())
                    })?;
                    info!(path = %path.display(), companies = companies.len(), "report saved");
                    return Ok(path);
                }
                Err(e) if e.kind() == IoErrorKind::AlreadyExists => attempt += 1,
                Err(e) => {
                    return Err(Error::from(e).with_operation("report::write").with_context("path", path.display().to_string()))
                }
            }
        }
    }
}

/// Render the report body
pub fn render(
    title: &str,
    now: DateTime<Local>,
    companies: &[Company],
    contacts: &[Option<ContactInfo>],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", title);
    let _ = writeln!(out, "*Generated on: {}*", now.format("%Y-%m-%d %H:%M:%S"));
    out.push('\n');

    for (i, company) in companies.iter().enumerate() {
        let _ = writeln!(out, "## {}", company.name);
        let _ = writeln!(out, "**Description:** {}", company.description);
        let _ = writeln!(out, "**Tags:** {}", company.tags.join(", "));
        match contacts.get(i).and_then(Option::as_ref) {
            Some(contact) => {
                let _ = writeln!(out, "**Contact Method:** {}", contact.contact_method);
                let _ = writeln!(out, "**Contact Details:** {}", contact.contact_details);
            }
            None => out.push_str("**Status:** Failed to retrieve contact information\n"),
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn company(name: &str) -> Company {
        Company {
            name: name.into(),
            description: format!("{} does things", name),
            tags: vec!["B2B".into(), "AI".into()],
        }
    }

    fn contact(details: &str) -> ContactInfo {
        ContactInfo {
            contact_method: "email".into(),
            contact_details: details.into(),
        }
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 2, 14, 9, 30, 5).unwrap()
    }

    #[test]
    fn test_render_pairs_positionally() {
        let companies = vec![company("Acme"), company("Birch")];
        let contacts = vec![Some(contact("hi@acme.dev")), None];

        let body = render(DEFAULT_TITLE, fixed_time(), &companies, &contacts);

        assert!(body.starts_with("# YC W25 Company Contact Information\n*Generated on: 2025-02-14 09:30:05*\n\n"));
        assert!(body.contains(
            "## Acme\n**Description:** Acme does things\n**Tags:** B2B, AI\n\
             **Contact Method:** email\n**Contact Details:** hi@acme.dev\n\n"
        ));
        assert!(body.contains("## Birch\n**Description:** Birch does things\n**Tags:** B2B, AI\n\
             **Status:** Failed to retrieve contact information\n\n"));
    }

    #[test]
    fn test_missing_slots_are_failures() {
        let companies = vec![company("Acme"), company("Birch"), company("Cedar")];
        let body = render(DEFAULT_TITLE, fixed_time(), &companies, &[Some(contact("x"))]);
        assert_eq!(body.matches("**Status:** Failed to retrieve contact information").count(), 2);
    }

    #[test]
    fn test_write_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("output"));
        let companies = vec![company("Acme")];

        let first = writer.write_at(fixed_time(), &companies, &[None]).unwrap();
        let second = writer.write_at(fixed_time(), &companies, &[Some(contact("a@b.c"))]).unwrap();

        assert_eq!(first.file_name().unwrap(), "contact_info_20250214_093005.md");
        assert_eq!(second.file_name().unwrap(), "contact_info_20250214_093005_1.md");
        assert!(fs::read_to_string(&first).unwrap().contains("Failed to retrieve"));
        assert!(fs::read_to_string(&second).unwrap().contains("a@b.c"));
    }

    #[test]
    fn test_write_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        fs::write(&blocker, "not a directory").unwrap();

        let err = ReportWriter::new(&blocker).write(&[company("Acme")], &[]).unwrap_err();
        assert_eq!(err.operation(), "report::write");
    }
}

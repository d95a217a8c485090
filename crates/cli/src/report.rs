//! HTML overview of a suite run
//!
//! The report is written incrementally: the header when the suite starts,
//! one row per finished test, the footer at the end. A partially written
//! report of an interrupted suite still shows every finished test.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::output::result_icon;
use crate::suite::{env_string, Env, Test};

/// File name of the report in the suite output directory
pub const INDEX: &str = "index.html";

/// Which artifacts the tests of a suite keep
#[derive(Debug, Clone, Copy)]
pub struct Artifacts {
    pub screenshot: bool,
    pub timelapse: bool,
}

pub struct Report {
    path: PathBuf,
    artifacts: Artifacts,
    defaults: Env,
}

/// Escape text for HTML element content and attribute values
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// `H:MM:SS`, whole seconds
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

impl Report {
    /// Create `<dir>/index.html` and write the header
    pub fn create(
        dir: &Path,
        suite: &str,
        started: DateTime<Local>,
        artifacts: Artifacts,
        defaults: Env,
    ) -> Result<Self> {
        let report = Self {
            path: dir.join(INDEX),
            artifacts,
            defaults,
        };

        let suite = escape(suite);
        let started = started.to_rfc3339();
        let header = format!(
            "<!DOCTYPE html>\
             <html lang=en-gb>\
             <head>\
             <title>Test suite {suite} ({started})</title>\
             <meta charset=utf-8>\
             <style>\
             body {{ font-family: sans-serif; }}\
             table, th, td {{ border: 1px solid gray; border-collapse: collapse; }}\
             td {{ padding: 0.2em; }}\
             </style>\
             </head>\
             <body>\
             <h1>Suite: {suite}</h1>\
             <p>Started at {started}</p>\
             <h2>Results</h2>\
             <table>\
             <tr>\
             <th>🧪</th><th>Test</th>\
             <th>OS</th><th>Release</th><th>Edition</th><th>Environment</th>\
             <th>📷</th><th>🎥</th><th>📝</th><th>⏱️</th>\
             </tr>"
        );

        std::fs::write(&report.path, header)
            .with_context(|| format!("Failed to write {}", report.path.display()))?;
        Ok(report)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, html: &str) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(html.as_bytes())?;
        Ok(())
    }

    /// Row for one finished test
    pub fn row(&self, test: &Test, passed: bool, duration: Duration) -> String {
        let base = escape(&test.output_dir(Path::new("")).to_string_lossy());

        let mut row = String::from("<tr>");
        let _ = write!(row, "<td>{}</td>", result_icon(passed));
        let _ = write!(row, "<td>{}</td>", escape(&test.name));
        let _ = write!(row, "<td>{}</td>", escape(&test.os));
        let _ = write!(row, "<td>{}</td>", escape(&test.release));
        let _ = write!(
            row,
            "<td>{}</td>",
            escape(test.edition.as_deref().unwrap_or(""))
        );
        let _ = write!(
            row,
            "<td>{}</td>",
            escape(&env_string(&test.env, Some(&self.defaults)))
        );

        if self.artifacts.screenshot {
            let _ = write!(
                row,
                "<td><a href=\"{base}.png\"><img style=\"height:2em\" src=\"{base}.png\" alt=\"🖼️\"/></a></td>"
            );
        } else {
            row.push_str("<td></td>");
        }

        if self.artifacts.timelapse {
            let _ = write!(row, "<td><a href=\"{base}.mp4\">▶️</a></td>");
        } else {
            row.push_str("<td></td>");
        }

        let _ = write!(row, "<td><a href=\"{base}.log\">📃</a></td>");
        let _ = write!(row, "<td>{}</td>", format_duration(duration));
        row.push_str("</tr>");
        row
    }

    pub fn add(&self, test: &Test, passed: bool, duration: Duration) -> Result<()> {
        self.append(&self.row(test, passed, duration))
    }

    pub fn finish(&self) -> Result<()> {
        self.append("</table></body></html>")
    }
}

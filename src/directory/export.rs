//! Export of the currently materialized page.
//!
//! Only the rows of the applied view model are exported, never the full
//! filtered result set. Every export is a no-op while a fetch is in flight
//! or when the page has no rows.

use tracing::info;

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{EmployeeRecord, ListViewModel};

pub const EXPORT_HEADERS: [&str; 7] = ["Code", "Name", "Email", "Department", "Role", "Salary", "Status"];

pub const CSV_MIME: &str = "text/csv;charset=utf-8;";
pub const EXCEL_MIME: &str = "application/vnd.ms-excel";
pub const HTML_MIME: &str = "text/html;charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Excel,
    Print,
}

/// A locally generated file, ready to be saved.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime: &'static str,
    pub content: String,
}

/// A new browsing context for the print flow.
pub trait PrintWindow {
    fn write_document(&mut self, html: &str) -> std::io::Result<()>;

    /// Hand the written document to the platform print flow.
    fn print(&mut self) -> std::io::Result<()>;
}

/// Opens print contexts; `None` when opening was refused (e.g. popup policy).
pub trait PrintSurface {
    fn open_window(&self, title: &str) -> Option<Box<dyn PrintWindow + '_>>;
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn row_values(row: &EmployeeRecord) -> [String; 7] {
    [
        row.emp_code.clone(),
        row.name.clone(),
        row.email.clone(),
        row.department.clone(),
        row.role.clone(),
        row.salary.to_string(),
        row.status.to_string(),
    ]
}

/// Delimited text: header line, then one fully quoted line per record.
pub fn build_csv(rows: &[EmployeeRecord]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(EXPORT_HEADERS.join(","));
    for row in rows {
        let line: Vec<String> = row_values(row).iter().map(|v| quote(v)).collect();
        lines.push(line.join(","));
    }
    lines.join("\n")
}

fn escape_lt(value: &str) -> String {
    value.replace('<', "&lt;")
}

/// Printable HTML table of the page.
pub fn build_print_html(rows: &[EmployeeRecord], page: u32) -> String {
    let header_cells: String = EXPORT_HEADERS
        .iter()
        .map(|h| format!("<th>{}</th>", h))
        .collect();

    let body_rows = rows
        .iter()
        .map(|e| {
            format!(
                r#"
              <tr>
                <td>{}</td>
                <td>{}</td>
                <td>{}</td>
                <td>{}</td>
                <td>{}</td>
                <td>{}</td>
                <td>{}</td>
              </tr>"#,
                e.emp_code,
                escape_lt(&e.name),
                escape_lt(&e.email),
                escape_lt(&e.department),
                escape_lt(&e.role),
                e.salary,
                escape_lt(e.status.as_str()),
            )
        })
        .collect::<Vec<_>>()
        .join("");

    format!(
        r#"<html>
      <head>
        <title>Employees - Page {page}</title>
        <style>
          body {{ font-family: Arial, sans-serif; padding: 20px; }}
          table {{ border-collapse: collapse; width: 100%; }}
          th, td {{ border: 1px solid #ccc; padding: 6px 8px; text-align: left; }}
          th {{ background: #f4f4f4; }}
        </style>
      </head>
      <body>
        <h2>Employees (Page {page})</h2>
        <table>
          <thead>
            <tr>{header_cells}</tr>
          </thead>
          <tbody>{body_rows}
          </tbody>
        </table>
      </body>
      </html>"#
    )
}

/// Renders artifacts from a view model snapshot.
pub struct ExportEngine;

impl ExportEngine {
    fn enabled(view: &ListViewModel, loading: bool) -> bool {
        !loading && !view.rows.is_empty()
    }

    pub fn csv(view: &ListViewModel, loading: bool) -> Option<ExportArtifact> {
        if !Self::enabled(view, loading) {
            return None;
        }
        Some(ExportArtifact {
            file_name: format!("employees_page{}.csv", view.page),
            mime: CSV_MIME,
            content: build_csv(&view.rows),
        })
    }

    /// Same bytes as the CSV export, typed for spreadsheet applications.
    pub fn excel(view: &ListViewModel, loading: bool) -> Option<ExportArtifact> {
        if !Self::enabled(view, loading) {
            return None;
        }
        Some(ExportArtifact {
            file_name: format!("employees_page{}.xls", view.page),
            mime: EXCEL_MIME,
            content: build_csv(&view.rows),
        })
    }

    /// Print artifact without opening a print context.
    pub fn printable(view: &ListViewModel, loading: bool) -> Option<ExportArtifact> {
        if !Self::enabled(view, loading) {
            return None;
        }
        Some(ExportArtifact {
            file_name: format!("employees_page{}.html", view.page),
            mime: HTML_MIME,
            content: build_print_html(&view.rows, view.page),
        })
    }

    /// Open a print context, write the table and start printing.
    ///
    /// Returns `Ok(false)` when there was nothing to print.
    pub fn print(
        view: &ListViewModel,
        loading: bool,
        surface: &dyn PrintSurface,
    ) -> DirectoryResult<bool> {
        let Some(artifact) = Self::printable(view, loading) else {
            return Ok(false);
        };
        let title = format!("Employees - Page {}", view.page);
        let mut window = surface
            .open_window(&title)
            .ok_or(DirectoryError::PopupBlocked)?;
        window
            .write_document(&artifact.content)
            .map_err(|e| DirectoryError::Export(e.to_string()))?;
        window
            .print()
            .map_err(|e| DirectoryError::Export(e.to_string()))?;
        info!(page = view.page, rows = view.rows.len(), "Sent page to print");
        Ok(true)
    }
}

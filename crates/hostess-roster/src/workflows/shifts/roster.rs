use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::domain::{Job, UserId, YearMonth};
use super::error::ShiftServiceError;
use super::repository::{RepositoryError, RosterStore};
use super::session::Session;

/// Rows preceding the slot rows: date, title, time, location, separator.
pub const HEADER_ROWS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum RosterExportError {
    #[error("nothing to export for {year}-{month:02}")]
    Empty { year: i32, month: u32 },
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer flush failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One job column: the job and its approved staff in application order.
#[derive(Debug, Clone)]
pub struct RosterColumn {
    pub job: Job,
    pub assignees: Vec<String>,
}

/// Date × slot grid. The first cell of each row is its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterMatrix {
    pub rows: Vec<Vec<String>>,
}

impl RosterMatrix {
    pub fn project(mut columns: Vec<RosterColumn>) -> Self {
        columns.sort_by_key(|column| column.job.starts_at);
        let max_slots = columns
            .iter()
            .map(|column| column.job.slots_total as usize)
            .max()
            .unwrap_or(0);

        let mut rows = Vec::with_capacity(HEADER_ROWS + max_slots);
        rows.push(header_row("", &columns, |c| {
            c.job.starts_at.format("%m.%d.%a").to_string()
        }));
        rows.push(header_row("", &columns, |c| c.job.title.clone()));
        rows.push(header_row("Time", &columns, |c| time_range(&c.job)));
        rows.push(header_row("Location", &columns, |c| c.job.location.clone()));
        rows.push(header_row("", &columns, |_| String::new()));

        for slot in 0..max_slots {
            let mut row = Vec::with_capacity(columns.len() + 1);
            row.push(format!("{}.", slot + 1));
            row.extend(
                columns
                    .iter()
                    .map(|column| column.assignees.get(slot).cloned().unwrap_or_default()),
            );
            rows.push(row);
        }

        Self { rows }
    }

    pub fn slot_rows(&self) -> usize {
        self.rows.len().saturating_sub(HEADER_ROWS)
    }

    pub fn to_csv(&self) -> Result<Vec<u8>, RosterExportError> {
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(Vec::new());
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|err| RosterExportError::Io(err.into_error()))
    }
}

fn header_row(
    label: &str,
    columns: &[RosterColumn],
    cell: impl Fn(&RosterColumn) -> String,
) -> Vec<String> {
    std::iter::once(label.to_string())
        .chain(columns.iter().map(cell))
        .collect()
}

fn time_range(job: &Job) -> String {
    let start = job.starts_at.format("%H:%M");
    match job.ends_at {
        Some(end) => format!("{start}-{}", end.format("%H:%M")),
        None => format!("{start}-???"),
    }
}

/// Month roster for administrators.
pub struct RosterService<S> {
    store: Arc<S>,
}

impl<S> RosterService<S>
where
    S: RosterStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn columns(&self, period: YearMonth) -> Result<Vec<RosterColumn>, RepositoryError> {
        let names: HashMap<UserId, String> = self
            .store
            .profiles()
            .await?
            .into_iter()
            .map(|profile| (profile.id, profile.full_name))
            .collect();

        let jobs = self
            .store
            .jobs_between(period.start(), period.next().start())
            .await?;
        let mut columns = Vec::with_capacity(jobs.len());
        for job in jobs {
            let mut approved: Vec<_> = self
                .store
                .applications_for_job(job.id)
                .await?
                .into_iter()
                .filter(|app| app.is_approved())
                .collect();
            approved.sort_by_key(|app| app.created_at);
            let assignees = approved
                .iter()
                .map(|app| names.get(&app.user_id).cloned().unwrap_or_default())
                .collect();
            columns.push(RosterColumn { job, assignees });
        }
        Ok(columns)
    }

    pub async fn matrix(
        &self,
        session: &Session,
        period: YearMonth,
    ) -> Result<RosterMatrix, ShiftServiceError> {
        session.require_admin("viewing the roster")?;
        Ok(RosterMatrix::project(self.columns(period).await?))
    }

    pub async fn export_csv(
        &self,
        session: &Session,
        period: YearMonth,
    ) -> Result<Vec<u8>, ShiftServiceError> {
        session.require_admin("exporting the roster")?;
        let columns = self.columns(period).await?;
        if columns.is_empty() {
            return Err(RosterExportError::Empty {
                year: period.year,
                month: period.month,
            }
            .into());
        }
        let bytes = RosterMatrix::project(columns).to_csv()?;
        info!(year = period.year, month = period.month, bytes = bytes.len(), "roster exported");
        Ok(bytes)
    }
}

/// Download name for a month's export.
pub fn export_file_name(period: YearMonth) -> String {
    format!("roster-{}-{:02}.csv", period.year, period.month)
}

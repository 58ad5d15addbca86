use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::{
    migrate::MigrateError, sqlite::SqlitePoolOptions, Row, Sqlite, SqlitePool, Transaction,
};
use thiserror::Error;

use obliga_core::types::{
    BuildingType, CompletionRecord, Frequency, JobStatus, LegalTemplate, LibraryEntry,
    ScheduledJob, TemplateStatus,
};

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle for interacting with legal templates.
    pub fn templates(&self) -> TemplateRepository {
        TemplateRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for interacting with the scheduled-job store.
    pub fn jobs(&self) -> JobRepository {
        JobRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for interacting with completion history.
    pub fn completions(&self) -> CompletionRepository {
        CompletionRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for interacting with the obligation library.
    pub fn library(&self) -> LibraryRepository {
        LibraryRepository {
            pool: self.pool.clone(),
        }
    }

    /// Begins a transaction spanning template and job mutations.
    pub async fn begin(&self) -> Result<Transaction<'_, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for legal-obligation templates.
#[derive(Clone)]
pub struct TemplateRepository {
    pool: SqlitePool,
}

impl TemplateRepository {
    /// Inserts a new template inside the provided transaction.
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        record: &NewTemplate<'_>,
    ) -> Result<(), TemplateError> {
        let requires_quote = if record.requires_quote { 1 } else { 0 };
        let active = if record.active { 1 } else { 0 };
        sqlx::query(
            "INSERT INTO legal_templates \
             (id, name, description, due_month, notice_period, responsible_emails, frequency, conditions, requires_quote, active, status, last_completion_date, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)",
        )
        .bind(record.id)
        .bind(record.name)
        .bind(record.description)
        .bind(to_date_string(record.due_month))
        .bind(i64::from(record.notice_period))
        .bind(record.responsible_emails)
        .bind(record.frequency.as_str())
        .bind(record.conditions)
        .bind(requires_quote)
        .bind(active)
        .bind(TemplateStatus::Pending.as_str())
        .bind(to_rfc3339(record.created_at))
        .bind(to_rfc3339(record.created_at))
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Fetches a single template by id.
    pub async fn fetch(&self, template_id: &str) -> Result<LegalTemplate, TemplateError> {
        let row = sqlx::query_as::<_, TemplateRow>(
            "SELECT id, name, description, due_month, notice_period, responsible_emails, \
             frequency, conditions, requires_quote, active, status, last_completion_date, created_at, updated_at \
             FROM legal_templates WHERE id = ?",
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TemplateError::NotFound)?;

        Ok(row.into_domain())
    }

    /// Lists active templates ordered by due date.
    pub async fn list(&self) -> Result<Vec<LegalTemplate>, TemplateError> {
        let rows = sqlx::query_as::<_, TemplateRow>(
            "SELECT id, name, description, due_month, notice_period, responsible_emails, \
             frequency, conditions, requires_quote, active, status, last_completion_date, created_at, updated_at \
             FROM legal_templates WHERE active = 1 ORDER BY due_month ASC, name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TemplateRow::into_domain).collect())
    }

    /// Rewrites the mutable fields of a template inside the provided transaction.
    pub async fn update(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        template_id: &str,
        record: &TemplateUpdate<'_>,
    ) -> Result<(), TemplateError> {
        let requires_quote = if record.requires_quote { 1 } else { 0 };
        let active = if record.active { 1 } else { 0 };
        let result = sqlx::query(
            "UPDATE legal_templates \
             SET name = ?, description = ?, due_month = ?, notice_period = ?, \
                 responsible_emails = ?, frequency = ?, conditions = ?, requires_quote = ?, \
                 active = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(record.name)
        .bind(record.description)
        .bind(to_date_string(record.due_month))
        .bind(i64::from(record.notice_period))
        .bind(record.responsible_emails)
        .bind(record.frequency.as_str())
        .bind(record.conditions)
        .bind(requires_quote)
        .bind(active)
        .bind(to_rfc3339(record.updated_at))
        .bind(template_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TemplateError::NotFound);
        }
        Ok(())
    }

    /// Records a completion outcome: status transition, optional new due date
    /// and the last completion date.
    pub async fn apply_completion(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        template_id: &str,
        status: TemplateStatus,
        due_month: NaiveDate,
        completion_date: NaiveDate,
        updated_at: DateTime<Utc>,
    ) -> Result<(), TemplateError> {
        let result = sqlx::query(
            "UPDATE legal_templates \
             SET status = ?, due_month = ?, last_completion_date = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(to_date_string(due_month))
        .bind(to_date_string(completion_date))
        .bind(to_rfc3339(updated_at))
        .bind(template_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TemplateError::NotFound);
        }
        Ok(())
    }

    /// Deletes a template; scheduled jobs and history rows cascade.
    pub async fn delete(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        template_id: &str,
    ) -> Result<(), TemplateError> {
        let result = sqlx::query("DELETE FROM legal_templates WHERE id = ?")
            .bind(template_id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TemplateError::NotFound);
        }
        Ok(())
    }
}

/// Parameters required to insert a template.
pub struct NewTemplate<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub due_month: NaiveDate,
    pub notice_period: u32,
    pub responsible_emails: &'a str,
    pub frequency: Frequency,
    pub conditions: Option<&'a str>,
    pub requires_quote: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Parameters for rewriting a template's mutable fields.
pub struct TemplateUpdate<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub due_month: NaiveDate,
    pub notice_period: u32,
    pub responsible_emails: &'a str,
    pub frequency: Frequency,
    pub conditions: Option<&'a str>,
    pub requires_quote: bool,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct TemplateRow {
    id: String,
    name: String,
    description: Option<String>,
    due_month: NaiveDate,
    notice_period: i64,
    responsible_emails: String,
    frequency: String,
    conditions: Option<String>,
    requires_quote: i64,
    active: i64,
    status: String,
    last_completion_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TemplateRow {
    fn into_domain(self) -> LegalTemplate {
        let frequency = self.frequency.parse().unwrap_or(Frequency::Annual);
        let status = self.status.parse().unwrap_or(TemplateStatus::Pending);
        LegalTemplate {
            id: self.id,
            name: self.name,
            description: self.description,
            due_month: self.due_month,
            notice_period: self.notice_period.max(0) as u32,
            responsible_emails: self.responsible_emails,
            frequency,
            conditions: self.conditions,
            requires_quote: self.requires_quote != 0,
            active: self.active != 0,
            status,
            last_completion_date: self.last_completion_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Errors that can occur while operating on templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for the time-indexed scheduled-job store.
#[derive(Clone)]
pub struct JobRepository {
    pool: SqlitePool,
}

impl JobRepository {
    /// Inserts a pending job inside the provided transaction.
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        job: &ScheduledJob,
        created_at: DateTime<Utc>,
    ) -> Result<(), JobError> {
        let recipients_json = serde_json::to_string(&job.recipients)?;
        sqlx::query(
            "INSERT INTO scheduled_jobs \
             (id, template_id, template_name, recipients_json, fire_at, status, attempts, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&job.id)
        .bind(&job.template_id)
        .bind(&job.template_name)
        .bind(recipients_json)
        .bind(to_rfc3339(job.fire_at))
        .bind(JobStatus::Pending.as_str())
        .bind(to_rfc3339(created_at))
        .bind(to_rfc3339(created_at))
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Claims pending jobs whose fire instant has passed, oldest first.
    pub async fn due_before(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<JobRow>, JobError> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT id, template_id, template_name, recipients_json, fire_at, status, attempts, created_at, updated_at \
             FROM scheduled_jobs WHERE status = 'pending' AND fire_at <= ? \
             ORDER BY fire_at ASC LIMIT ?",
        )
        .bind(to_rfc3339(now))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Lists all pending jobs for the administrative view, soonest first.
    pub async fn list_pending(&self) -> Result<Vec<JobRow>, JobError> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT id, template_id, template_name, recipients_json, fire_at, status, attempts, created_at, updated_at \
             FROM scheduled_jobs WHERE status = 'pending' ORDER BY fire_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Marks a job as delivered.
    pub async fn mark_sent(&self, job_id: &str, now: DateTime<Utc>) -> Result<(), JobError> {
        sqlx::query(
            "UPDATE scheduled_jobs SET status = 'sent', updated_at = ? WHERE id = ?",
        )
        .bind(to_rfc3339(now))
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Increments the attempt counter after a failed send, returning the new count.
    pub async fn record_attempt(
        &self,
        job_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u32, JobError> {
        let row = sqlx::query(
            "UPDATE scheduled_jobs SET attempts = attempts + 1, updated_at = ? \
             WHERE id = ? RETURNING attempts",
        )
        .bind(to_rfc3339(now))
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;

        let attempts: i64 = row.get("attempts");
        Ok(attempts.max(0) as u32)
    }

    /// Retires a job after its attempts are exhausted.
    pub async fn mark_failed(&self, job_id: &str, now: DateTime<Utc>) -> Result<(), JobError> {
        sqlx::query(
            "UPDATE scheduled_jobs SET status = 'failed', updated_at = ? WHERE id = ?",
        )
        .bind(to_rfc3339(now))
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Cancels every pending job tied to a template, returning the count.
    pub async fn cancel_pending_for_template(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        template_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, JobError> {
        let result = sqlx::query(
            "UPDATE scheduled_jobs SET status = 'cancelled', updated_at = ? \
             WHERE template_id = ? AND status = 'pending'",
        )
        .bind(to_rfc3339(now))
        .bind(template_id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }
}

/// A scheduled-job row as stored.
#[derive(Debug, sqlx::FromRow)]
pub struct JobRow {
    pub id: String,
    pub template_id: String,
    pub template_name: String,
    pub recipients_json: String,
    pub fire_at: DateTime<Utc>,
    pub status: String,
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRow {
    /// Converts the row into the domain job descriptor.
    pub fn into_domain(self) -> Result<ScheduledJob, JobError> {
        let recipients: Vec<String> = serde_json::from_str(&self.recipients_json)?;
        Ok(ScheduledJob {
            id: self.id,
            template_id: self.template_id,
            template_name: self.template_name,
            recipients,
            fire_at: self.fire_at,
        })
    }
}

/// Errors that can occur while mutating the job store.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to decode recipients json: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for template completion history.
#[derive(Clone)]
pub struct CompletionRepository {
    pool: SqlitePool,
}

impl CompletionRepository {
    /// Records a completion inside the provided transaction.
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        record: &NewCompletion<'_>,
    ) -> Result<(), CompletionError> {
        sqlx::query(
            "INSERT INTO completions \
             (id, template_id, completion_date, previous_due_date, new_due_date, notes, actual_cost, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(record.template_id)
        .bind(to_date_string(record.completion_date))
        .bind(record.previous_due_date.map(to_date_string))
        .bind(record.new_due_date.map(to_date_string))
        .bind(record.notes)
        .bind(record.actual_cost)
        .bind(to_rfc3339(record.created_at))
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Lists completions for a template, newest first.
    pub async fn list_for_template(
        &self,
        template_id: &str,
    ) -> Result<Vec<CompletionRecord>, CompletionError> {
        let rows = sqlx::query_as::<_, CompletionRow>(
            "SELECT id, template_id, completion_date, previous_due_date, new_due_date, notes, actual_cost, created_at \
             FROM completions WHERE template_id = ? ORDER BY completion_date DESC, created_at DESC",
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CompletionRow::into_domain).collect())
    }

    /// Lists completions across every template, newest first, each carrying
    /// the owning template's name.
    pub async fn list_all(&self) -> Result<Vec<CompletionSummary>, CompletionError> {
        let rows = sqlx::query_as::<_, CompletionSummaryRow>(
            "SELECT c.id, c.template_id, t.name AS template_name, c.completion_date, \
             c.previous_due_date, c.new_due_date, c.notes, c.actual_cost, c.created_at \
             FROM completions c JOIN legal_templates t ON t.id = c.template_id \
             ORDER BY c.completion_date DESC, c.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CompletionSummaryRow::into_domain).collect())
    }
}

/// A completion joined with its template's name, for the global listing.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSummary {
    pub template_name: String,
    pub record: CompletionRecord,
}

#[derive(Debug, sqlx::FromRow)]
struct CompletionSummaryRow {
    id: String,
    template_id: String,
    template_name: String,
    completion_date: NaiveDate,
    previous_due_date: Option<NaiveDate>,
    new_due_date: Option<NaiveDate>,
    notes: Option<String>,
    actual_cost: Option<f64>,
    created_at: DateTime<Utc>,
}

impl CompletionSummaryRow {
    fn into_domain(self) -> CompletionSummary {
        CompletionSummary {
            template_name: self.template_name,
            record: CompletionRecord {
                id: self.id,
                template_id: self.template_id,
                completion_date: self.completion_date,
                previous_due_date: self.previous_due_date,
                new_due_date: self.new_due_date,
                notes: self.notes,
                actual_cost: self.actual_cost,
                created_at: self.created_at,
            },
        }
    }
}

/// Parameters required to record a completion.
pub struct NewCompletion<'a> {
    pub id: &'a str,
    pub template_id: &'a str,
    pub completion_date: NaiveDate,
    pub previous_due_date: Option<NaiveDate>,
    pub new_due_date: Option<NaiveDate>,
    pub notes: Option<&'a str>,
    pub actual_cost: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct CompletionRow {
    id: String,
    template_id: String,
    completion_date: NaiveDate,
    previous_due_date: Option<NaiveDate>,
    new_due_date: Option<NaiveDate>,
    notes: Option<String>,
    actual_cost: Option<f64>,
    created_at: DateTime<Utc>,
}

impl CompletionRow {
    fn into_domain(self) -> CompletionRecord {
        CompletionRecord {
            id: self.id,
            template_id: self.template_id,
            completion_date: self.completion_date,
            previous_due_date: self.previous_due_date,
            new_due_date: self.new_due_date,
            notes: self.notes,
            actual_cost: self.actual_cost,
            created_at: self.created_at,
        }
    }
}

/// Errors that can occur while operating on completion history.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for the obligation library master list.
#[derive(Clone)]
pub struct LibraryRepository {
    pool: SqlitePool,
}

impl LibraryRepository {
    /// Inserts a new library entry. Entry names are unique.
    pub async fn insert(&self, record: &NewLibraryEntry<'_>) -> Result<(), LibraryError> {
        let requires_quote = if record.requires_quote { 1 } else { 0 };
        let result = sqlx::query(
            "INSERT INTO obligation_library \
             (id, name, description, building_type, frequency, conditions, requires_quote, notice_period, usage_count, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(record.id)
        .bind(record.name)
        .bind(record.description)
        .bind(record.building_type.map(BuildingType::as_str))
        .bind(record.frequency.as_str())
        .bind(record.conditions)
        .bind(requires_quote)
        .bind(i64::from(record.notice_period))
        .bind(to_rfc3339(record.created_at))
        .bind(to_rfc3339(record.created_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(LibraryError::DuplicateName(record.name.to_string()))
            }
            Err(err) => Err(LibraryError::Database(err)),
        }
    }

    /// Fetches a single entry by id.
    pub async fn fetch(&self, entry_id: &str) -> Result<LibraryEntry, LibraryError> {
        let row = sqlx::query_as::<_, LibraryRow>(
            "SELECT id, name, description, building_type, frequency, conditions, requires_quote, notice_period, usage_count, created_at, updated_at \
             FROM obligation_library WHERE id = ?",
        )
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LibraryError::NotFound)?;

        Ok(row.into_domain())
    }

    /// Lists all entries ordered by name.
    pub async fn list(&self) -> Result<Vec<LibraryEntry>, LibraryError> {
        let rows = sqlx::query_as::<_, LibraryRow>(
            "SELECT id, name, description, building_type, frequency, conditions, requires_quote, notice_period, usage_count, created_at, updated_at \
             FROM obligation_library ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LibraryRow::into_domain).collect())
    }

    /// Bumps the usage counter when an entry is activated into a template.
    pub async fn record_activation(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        entry_id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), LibraryError> {
        let result = sqlx::query(
            "UPDATE obligation_library SET usage_count = usage_count + 1, updated_at = ? WHERE id = ?",
        )
        .bind(to_rfc3339(updated_at))
        .bind(entry_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound);
        }
        Ok(())
    }
}

/// Parameters required to insert a library entry.
pub struct NewLibraryEntry<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub building_type: Option<BuildingType>,
    pub frequency: Frequency,
    pub conditions: Option<&'a str>,
    pub requires_quote: bool,
    pub notice_period: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct LibraryRow {
    id: String,
    name: String,
    description: Option<String>,
    building_type: Option<String>,
    frequency: String,
    conditions: Option<String>,
    requires_quote: i64,
    notice_period: i64,
    usage_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LibraryRow {
    fn into_domain(self) -> LibraryEntry {
        let frequency = self.frequency.parse().unwrap_or(Frequency::Annual);
        let building_type = self.building_type.and_then(|raw| raw.parse().ok());
        LibraryEntry {
            id: self.id,
            name: self.name,
            description: self.description,
            building_type,
            frequency,
            conditions: self.conditions,
            requires_quote: self.requires_quote != 0,
            notice_period: self.notice_period.max(0) as u32,
            usage_count: self.usage_count.max(0) as u32,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Errors that can occur while operating on the obligation library.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library entry not found")]
    NotFound,
    #[error("a library entry named '{0}' already exists")]
    DuplicateName(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn to_date_string(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

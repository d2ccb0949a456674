//! PostgreSQL backend for postings and publishing runs.
//!
//! The compare-and-set is one conditional `UPDATE ... RETURNING`; Postgres row locking
//! admits a single winner per posting no matter how many servers race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::info;
use uuid::Uuid;

use super::domain::{
    ChannelOutcome, JobPosting, JobPostingId, PostingStatus, PublishedPosting, PublishingRun,
    RunSummary, RunTrigger,
};
use super::repository::{
    PostingRepository, RepositoryError, RunStore, RunStoreError, TransitionError,
};

const SCHEMA: &str = include_str!("../../../migrations/0001_publication.sql");

const POSTING_COLUMNS: &str = "id, code, title, description, required_skills, preferred_skills, \
     qualifications, salary_min, salary_max, application_deadline, is_published, status, \
     published_at";

pub struct PgPublicationStore {
    pool: PgPool,
}

impl PgPublicationStore {
    /// Connects and applies the schema.
    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(unavailable)?;
        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        info!("publication schema ready");
        Ok(())
    }

    /// Seeds or replaces a posting; used by fixtures and the seed file.
    pub async fn upsert(&self, posting: &JobPosting) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO job_postings (
                id, code, title, description, required_skills, preferred_skills,
                qualifications, salary_min, salary_max, application_deadline,
                is_published, status, published_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                code = EXCLUDED.code,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                required_skills = EXCLUDED.required_skills,
                preferred_skills = EXCLUDED.preferred_skills,
                qualifications = EXCLUDED.qualifications,
                salary_min = EXCLUDED.salary_min,
                salary_max = EXCLUDED.salary_max,
                application_deadline = EXCLUDED.application_deadline,
                is_published = EXCLUDED.is_published,
                status = EXCLUDED.status,
                published_at = EXCLUDED.published_at
            "#,
        )
        .bind(&posting.id.0)
        .bind(&posting.code)
        .bind(&posting.title)
        .bind(&posting.description)
        .bind(&posting.required_skills)
        .bind(&posting.preferred_skills)
        .bind(&posting.qualifications)
        .bind(posting.salary_min.map(i64::from))
        .bind(posting.salary_max.map(i64::from))
        .bind(posting.application_deadline)
        .bind(posting.is_published)
        .bind(posting.status.as_str())
        .bind(posting.published_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }
}

#[derive(FromRow)]
struct PostingRow {
    id: String,
    code: String,
    title: Option<String>,
    description: Option<String>,
    required_skills: Vec<String>,
    preferred_skills: Vec<String>,
    qualifications: Vec<String>,
    salary_min: Option<i64>,
    salary_max: Option<i64>,
    application_deadline: Option<DateTime<Utc>>,
    is_published: bool,
    status: String,
    published_at: Option<DateTime<Utc>>,
}

impl TryFrom<PostingRow> for JobPosting {
    type Error = RepositoryError;

    fn try_from(row: PostingRow) -> Result<Self, Self::Error> {
        let status = PostingStatus::parse(&row.status).ok_or_else(|| {
            RepositoryError::Unavailable(format!("unknown posting status '{}'", row.status))
        })?;
        Ok(Self {
            id: JobPostingId(row.id),
            code: row.code,
            title: row.title,
            description: row.description,
            required_skills: row.required_skills,
            preferred_skills: row.preferred_skills,
            qualifications: row.qualifications,
            salary_min: salary(row.salary_min, "salary_min")?,
            salary_max: salary(row.salary_max, "salary_max")?,
            application_deadline: row.application_deadline,
            is_published: row.is_published,
            status,
            published_at: row.published_at,
        })
    }
}

#[derive(FromRow)]
struct RunRow {
    run_id: Uuid,
    job_posting_id: String,
    attempted_at: DateTime<Utc>,
    trigger: String,
    outcomes: Json<Vec<ChannelOutcome>>,
    total: i32,
    succeeded: i32,
    failed: i32,
}

impl TryFrom<RunRow> for PublishingRun {
    type Error = RunStoreError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let trigger = RunTrigger::parse(&row.trigger).ok_or_else(|| {
            RunStoreError::Unavailable(format!(
                "run {} has unknown trigger '{}'",
                row.run_id, row.trigger
            ))
        })?;
        Ok(Self {
            run_id: row.run_id,
            job_posting_id: JobPostingId(row.job_posting_id),
            attempted_at: row.attempted_at,
            trigger,
            outcomes: row.outcomes.0,
            summary: RunSummary {
                total: count(row.run_id, "total", row.total)?,
                succeeded: count(row.run_id, "succeeded", row.succeeded)?,
                failed: count(row.run_id, "failed", row.failed)?,
            },
        })
    }
}

fn salary(value: Option<i64>, column: &str) -> Result<Option<u32>, RepositoryError> {
    value
        .map(|raw| {
            u32::try_from(raw).map_err(|_| {
                RepositoryError::Unavailable(format!("{column} {raw} is outside the salary range"))
            })
        })
        .transpose()
}

fn count(run_id: Uuid, column: &str, value: i32) -> Result<usize, RunStoreError> {
    usize::try_from(value).map_err(|_| {
        RunStoreError::Unavailable(format!("run {run_id} has negative {column} count {value}"))
    })
}

#[async_trait]
impl PostingRepository for PgPublicationStore {
    async fn fetch(&self, id: &JobPostingId) -> Result<Option<JobPosting>, RepositoryError> {
        let row = sqlx::query_as::<_, PostingRow>(&format!(
            "SELECT {POSTING_COLUMNS} FROM job_postings WHERE id = $1"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(JobPosting::try_from).transpose()
    }

    async fn try_publish(
        &self,
        id: &JobPostingId,
        now: DateTime<Utc>,
    ) -> Result<PublishedPosting, TransitionError> {
        let updated = sqlx::query_as::<_, PostingRow>(&format!(
            r#"
            UPDATE job_postings
            SET is_published = TRUE, status = 'active', published_at = $2
            WHERE id = $1 AND is_published = FALSE
            RETURNING {POSTING_COLUMNS}
            "#
        ))
        .bind(&id.0)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        if let Some(row) = updated {
            return Ok(PublishedPosting {
                posting: JobPosting::try_from(row)?,
                published_at: now,
            });
        }

        // Zero rows matched: either the id is unknown or the flag was already set.
        // The flag never reverts, so this follow-up read cannot contradict the update.
        let current: Option<(String, Option<DateTime<Utc>>)> =
            sqlx::query_as("SELECT status, published_at FROM job_postings WHERE id = $1")
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;

        match current {
            None => Err(TransitionError::NotFound),
            Some((status, published_at)) => match PostingStatus::parse(&status) {
                Some(status) => Err(TransitionError::AlreadyPublished {
                    status,
                    published_at,
                }),
                None => Err(RepositoryError::Unavailable(format!(
                    "unknown posting status '{status}'"
                ))
                .into()),
            },
        }
    }
}

#[async_trait]
impl RunStore for PgPublicationStore {
    async fn record(&self, run: PublishingRun) -> Result<(), RunStoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO publishing_runs (
                run_id, job_posting_id, attempted_at, trigger, outcomes,
                total, succeeded, failed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(run.run_id)
        .bind(&run.job_posting_id.0)
        .bind(run.attempted_at)
        .bind(run.trigger.as_str())
        .bind(Json(&run.outcomes))
        .bind(i32::try_from(run.summary.total).unwrap_or(i32::MAX))
        .bind(i32::try_from(run.summary.succeeded).unwrap_or(i32::MAX))
        .bind(i32::try_from(run.summary.failed).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(RunStoreError::Duplicate(run.run_id))
            }
            Err(err) => Err(RunStoreError::Unavailable(err.to_string())),
        }
    }

    async fn runs_for(&self, id: &JobPostingId) -> Result<Vec<PublishingRun>, RunStoreError> {
        let rows = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT run_id, job_posting_id, attempted_at, trigger, outcomes,
                   total, succeeded, failed
            FROM publishing_runs
            WHERE job_posting_id = $1
            ORDER BY attempted_at, seq
            "#,
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| RunStoreError::Unavailable(err.to_string()))?;

        rows.into_iter().map(PublishingRun::try_from).collect()
    }
}

fn unavailable(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Unavailable(err.to_string())
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use obliga_core::scheduler;
use obliga_mailer::Mailer;
use obliga_storage::{Database, JobError};

/// Delivery attempts before a job is retired as failed.
pub const MAX_ATTEMPTS: u32 = 5;

/// Upper bound on jobs claimed per cycle.
const CLAIM_BATCH: i64 = 50;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("job store error: {0}")]
    Jobs(#[from] JobError),
}

/// Background worker that delivers due notification jobs.
///
/// Each cycle claims pending jobs whose fire instant has passed, builds the
/// expiration notice and hands it to the mailer. A job whose instant is
/// already in the past when it lands in the store is picked up on the next
/// tick; nothing is ever silently dropped.
pub struct Dispatcher {
    storage: Database,
    mailer: Arc<dyn Mailer>,
    interval: Duration,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl Dispatcher {
    pub fn new(storage: Database, mailer: Arc<dyn Mailer>, interval: Duration) -> Self {
        Self {
            storage,
            mailer,
            interval,
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    /// Runs the dispatch loop until the task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                stage = "dispatch",
                interval_secs = self.interval.as_secs(),
                "dispatcher started"
            );
            loop {
                ticker.tick().await;
                if let Err(err) = self.run_cycle().await {
                    warn!(stage = "dispatch", error = %err, "dispatch cycle failed");
                }
            }
        })
    }

    /// Executes one dispatch cycle: claim due jobs, send, record outcomes.
    pub async fn run_cycle(&self) -> Result<(), DispatchError> {
        let started = Instant::now();
        let now = (self.clock)();
        let rows = self.storage.jobs().due_before(now, CLAIM_BATCH).await?;

        for row in rows {
            let job_id = row.id.clone();
            let job = match row.into_domain() {
                Ok(job) => job,
                Err(err) => {
                    warn!(stage = "dispatch", job_id = %job_id, error = %err, "unreadable job retired");
                    self.storage.jobs().mark_failed(&job_id, now).await?;
                    continue;
                }
            };

            let message = scheduler::build_message(&job.template_name);
            match self.mailer.send(&message, &job.recipients).await {
                Ok(()) => {
                    self.storage.jobs().mark_sent(&job.id, now).await?;
                    counter!("notify_jobs_sent_total").increment(1);
                    info!(
                        stage = "dispatch",
                        job_id = %job.id,
                        template_id = %job.template_id,
                        recipients = job.recipients.len(),
                        "expiration notice delivered"
                    );
                }
                Err(err) => {
                    let attempts = self.storage.jobs().record_attempt(&job.id, now).await?;
                    if attempts >= MAX_ATTEMPTS {
                        self.storage.jobs().mark_failed(&job.id, now).await?;
                        counter!("notify_send_failures_total", "outcome" => "exhausted")
                            .increment(1);
                        warn!(
                            stage = "dispatch",
                            job_id = %job.id,
                            attempts,
                            error = %err,
                            "delivery attempts exhausted, job failed"
                        );
                    } else {
                        counter!("notify_send_failures_total", "outcome" => "retry").increment(1);
                        warn!(
                            stage = "dispatch",
                            job_id = %job.id,
                            attempts,
                            error = %err,
                            "delivery failed, will retry next cycle"
                        );
                    }
                }
            }
        }

        histogram!("dispatch_cycle_seconds").record(started.elapsed().as_secs_f64());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use obliga_core::types::EmailMessage;
    use obliga_mailer::MailError;
    use obliga_storage::NewTemplate;

    struct StubMailer {
        sent: Mutex<Vec<(EmailMessage, Vec<String>)>>,
        fail: bool,
    }

    impl StubMailer {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn sent(&self) -> Vec<(EmailMessage, Vec<String>)> {
            self.sent.lock().expect("stub lock").clone()
        }
    }

    #[async_trait]
    impl Mailer for StubMailer {
        async fn send(
            &self,
            message: &EmailMessage,
            recipients: &[String],
        ) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Transport("connection refused".to_string()));
            }
            self.sent
                .lock()
                .expect("stub lock")
                .push((message.clone(), recipients.to_vec()));
            Ok(())
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 20, 12, 0, 0).unwrap()
    }

    async fn setup_db() -> Database {
        let db = Database::connect("sqlite::memory:?cache=shared")
            .await
            .expect("connect");
        db.run_migrations().await.expect("migrations");
        db
    }

    async fn seed_job(db: &Database, template_id: &str, name: &str, fire_at: DateTime<Utc>) {
        let mut tx = db.begin().await.expect("begin");
        db.templates()
            .insert(
                &mut tx,
                &NewTemplate {
                    id: template_id,
                    name,
                    description: None,
                    due_month: chrono::NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
                    notice_period: 14,
                    responsible_emails: "a@x.com, b@y.com",
                    frequency: obliga_core::types::Frequency::Annual,
                    conditions: None,
                    requires_quote: false,
                    active: true,
                    created_at: fixed_now(),
                },
            )
            .await
            .expect("insert template");
        let job = scheduler::schedule(
            template_id,
            name,
            &["a@x.com".to_string(), "b@y.com".to_string()],
            fire_at,
        );
        db.jobs()
            .insert(&mut tx, &job, fixed_now())
            .await
            .expect("insert job");
        tx.commit().await.expect("commit");
    }

    fn dispatcher(db: &Database, mailer: Arc<dyn Mailer>) -> Dispatcher {
        Dispatcher::new(db.clone(), mailer, Duration::from_secs(30))
            .with_clock(Arc::new(fixed_now))
    }

    #[tokio::test]
    async fn cycle_delivers_due_jobs_and_marks_them_sent() {
        let db = setup_db().await;
        seed_job(
            &db,
            "t-1",
            "Fire Safety Inspection",
            Utc.with_ymd_and_hms(2025, 12, 17, 9, 0, 0).unwrap(),
        )
        .await;

        let mailer = StubMailer::new(false);
        let worker = dispatcher(&db, mailer.clone());
        worker.run_cycle().await.expect("cycle");

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        let (message, recipients) = &sent[0];
        assert_eq!(message.subject, "Legal Obligation Expiration Notice");
        assert_eq!(
            message.body,
            "The legal obligation expiration date is approaching. You need to prepare.\n\nTemplate: Fire Safety Inspection"
        );
        assert_eq!(
            recipients,
            &vec!["a@x.com".to_string(), "b@y.com".to_string()]
        );

        let status: (String,) = sqlx::query_as("SELECT status FROM scheduled_jobs")
            .fetch_one(db.pool())
            .await
            .expect("status");
        assert_eq!(status.0, "sent");

        // A second cycle finds nothing left to deliver.
        worker.run_cycle().await.expect("second cycle");
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn future_jobs_are_left_pending() {
        let db = setup_db().await;
        seed_job(
            &db,
            "t-1",
            "Elevator Inspection",
            Utc.with_ymd_and_hms(2026, 1, 17, 9, 0, 0).unwrap(),
        )
        .await;

        let mailer = StubMailer::new(false);
        dispatcher(&db, mailer.clone())
            .run_cycle()
            .await
            .expect("cycle");

        assert!(mailer.sent().is_empty());
        let status: (String,) = sqlx::query_as("SELECT status FROM scheduled_jobs")
            .fetch_one(db.pool())
            .await
            .expect("status");
        assert_eq!(status.0, "pending");
    }

    #[tokio::test]
    async fn failing_sends_retry_until_attempts_run_out() {
        let db = setup_db().await;
        seed_job(
            &db,
            "t-1",
            "Tax Payment",
            Utc.with_ymd_and_hms(2025, 12, 17, 9, 0, 0).unwrap(),
        )
        .await;

        let mailer = StubMailer::new(true);
        let worker = dispatcher(&db, mailer);

        for expected_attempts in 1..MAX_ATTEMPTS {
            worker.run_cycle().await.expect("cycle");
            let row: (String, i64) = sqlx::query_as("SELECT status, attempts FROM scheduled_jobs")
                .fetch_one(db.pool())
                .await
                .expect("row");
            assert_eq!(row.0, "pending");
            assert_eq!(row.1, i64::from(expected_attempts));
        }

        worker.run_cycle().await.expect("final cycle");
        let row: (String, i64) = sqlx::query_as("SELECT status, attempts FROM scheduled_jobs")
            .fetch_one(db.pool())
            .await
            .expect("row");
        assert_eq!(row.0, "failed");
        assert_eq!(row.1, i64::from(MAX_ATTEMPTS));

        // Retired jobs are not claimed again.
        worker.run_cycle().await.expect("after failure");
        let row: (String, i64) = sqlx::query_as("SELECT status, attempts FROM scheduled_jobs")
            .fetch_one(db.pool())
            .await
            .expect("row");
        assert_eq!(row.1, i64::from(MAX_ATTEMPTS));
    }
}

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;

use crate::economy::{EconomyService, TIMED_AWARD_BASE};
use crate::error::{EconomyError, SubmitError};
use crate::notifier::{LogNotifier, Notifier};
use crate::session::{SessionMode, SessionStore, TaskSession};
use code_runner::{run_code, ExecutionConfig};
use db::models::submission::{truncate_chars, Model as Submission};
use db::models::task::Model as Task;

/// How much captured output is shown back to the student. The stored copy
/// keeps more (see `db::models::submission::STORED_OUTPUT_LIMIT`).
pub const DISPLAY_OUTPUT_LIMIT: usize = 2000;

/// Seconds a timed attempt has to earn its bonus.
pub const DEFAULT_TIMED_WINDOW_SECS: i64 = 600;

/// Who is submitting. Unregistered callers get a dry-run: their code is
/// executed but nothing is persisted and no points move.
#[derive(Debug, Clone, Copy)]
pub struct Submitter {
    pub id: i64,
    pub registered: bool,
    pub staff: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub passed: bool,
    pub display_output: String,
    pub submission_id: Option<i64>,
    pub bonus_awarded: i64,
    pub chest_reward: Option<i64>,
    pub streak: i64,
}

/// Strips a wrapping fenced code block, if present, and returns the source
/// text verbatim. Interior content is never reformatted: messaging layers
/// like to mangle underscores, so the pipeline works on the raw bytes
/// between the fence lines.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return raw;
    }
    let Some(open_end) = trimmed.find('\n') else {
        return raw;
    };
    let Some(close_start) = trimmed.rfind('\n') else {
        return raw;
    };
    if close_start <= open_end || trimmed[close_start + 1..].trim() != "```" {
        return raw;
    }
    &trimmed[open_end + 1..close_start]
}

/// Bonus for a timed session resolved at `now`, or `None` when no bonus is
/// due (untimed session, or the window has lapsed; the stake stays spent
/// either way).
pub(crate) fn timed_award(session: &TaskSession, now: DateTime<Utc>, window_secs: i64) -> Option<i64> {
    if session.mode != SessionMode::Timed {
        return None;
    }
    let elapsed = (now - session.started_at).num_seconds();
    if elapsed <= window_secs {
        Some(TIMED_AWARD_BASE + 2 * session.bet)
    } else {
        None
    }
}

/// Orchestrates one evaluation: resolve the task, run the code, persist the
/// result, settle the session and the ledger, fire a notification.
pub struct SubmissionPipeline {
    db: DatabaseConnection,
    economy: EconomyService,
    sessions: SessionStore,
    runner_config: ExecutionConfig,
    notifier: Arc<dyn Notifier>,
    timed_window_secs: i64,
}

impl SubmissionPipeline {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            economy: EconomyService::new(db.clone()),
            sessions: SessionStore::new(),
            runner_config: ExecutionConfig::from_env(),
            notifier: Arc::new(LogNotifier),
            timed_window_secs: DEFAULT_TIMED_WINDOW_SECS,
            db,
        }
    }

    /// Build from the process-wide configuration (timed window and friends).
    pub fn from_config(db: DatabaseConnection) -> Self {
        let config = common::config::Config::get();
        Self::new(db).with_timed_window(config.timed_window_secs)
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_timed_window(mut self, window_secs: i64) -> Self {
        self.timed_window_secs = window_secs;
        self
    }

    pub fn economy(&self) -> &EconomyService {
        &self.economy
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Open a task without a timer. Any previous session for the pair is
    /// reset first (refunding its stake if it had one).
    pub async fn open_untimed(
        &self,
        student_id: i64,
        task_id: i64,
    ) -> Result<(), EconomyError> {
        self.reset(student_id, task_id).await?;
        self.sessions.open_untimed(student_id, task_id).await;
        Ok(())
    }

    /// Open a task on the clock, staking `bet` points. The stake is
    /// escrowed up front; if the escrow is rejected no session is created.
    pub async fn open_timed(
        &self,
        student_id: i64,
        task_id: i64,
        bet: i64,
    ) -> Result<(), EconomyError> {
        self.reset(student_id, task_id).await?;
        if bet > 0 {
            self.economy.escrow(student_id, bet).await?;
        }
        self.sessions.open_timed(student_id, task_id, bet).await;
        Ok(())
    }

    /// Abandon the attempt. A timed stake is refunded in full: giving up
    /// before submitting is free, unlike failing.
    pub async fn reset(&self, student_id: i64, task_id: i64) -> Result<bool, EconomyError> {
        match self.sessions.take(student_id, task_id).await {
            Some(session) if session.mode == SessionMode::Timed && session.bet > 0 => {
                self.economy.refund(student_id, session.bet).await?;
                Ok(true)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    pub async fn submit(
        &self,
        submitter: Submitter,
        task_id: i64,
        raw_text: &str,
    ) -> Result<SubmissionOutcome, SubmitError> {
        let task = Task::get_by_id(&self.db, task_id)
            .await?
            .ok_or(SubmitError::TaskNotFound(task_id))?;

        let code = strip_code_fence(raw_text);
        let result = run_code(code, &task.test_code, task.language.as_str(), &self.runner_config).await;
        let display_output = truncate_chars(&result.output, DISPLAY_OUTPUT_LIMIT).to_string();

        // Dry-run for unregistered callers: no row, no points, no session.
        if !submitter.registered && !submitter.staff {
            return Ok(SubmissionOutcome {
                passed: result.passed,
                display_output,
                submission_id: None,
                bonus_awarded: 0,
                chest_reward: None,
                streak: 0,
            });
        }

        let submission = Submission::create(
            &self.db,
            submitter.id,
            task_id,
            code,
            result.passed,
            &result.output,
        )
        .await?;

        // The session dies with the submission, pass or fail.
        let session = self.sessions.take(submitter.id, task_id).await;

        let mut bonus_awarded = 0;
        let mut chest_reward = None;
        let mut streak = 0;

        if result.passed {
            if let Some(session) = &session {
                match timed_award(session, Utc::now(), self.timed_window_secs) {
                    Some(_) => {
                        bonus_awarded = self
                            .economy
                            .award_timed_bonus(submitter.id, session.bet)
                            .await
                            .map_err(SubmitError::Economy)?;
                    }
                    None if session.mode == SessionMode::Timed && session.bet > 0 => {
                        log::info!(
                            "student {} passed task {} after the window; stake {} forfeited",
                            submitter.id,
                            task_id,
                            session.bet
                        );
                    }
                    None => {}
                }
            }
            let reward = self
                .economy
                .record_pass(submitter.id)
                .await
                .map_err(SubmitError::Economy)?;
            streak = reward.streak;
            chest_reward = reward.chest;
        } else {
            self.economy
                .record_fail(submitter.id)
                .await
                .map_err(SubmitError::Economy)?;
        }

        self.dispatch_notification(&submission, &task.title, bonus_awarded, chest_reward);

        Ok(SubmissionOutcome {
            passed: result.passed,
            display_output,
            submission_id: Some(submission.id),
            bonus_awarded,
            chest_reward,
            streak,
        })
    }

    /// Fire-and-forget: the pipeline never waits on (or fails with) the
    /// notification sink.
    fn dispatch_notification(
        &self,
        submission: &db::models::submission::Model,
        task_title: &str,
        bonus_awarded: i64,
        chest_reward: Option<i64>,
    ) {
        let notifier = Arc::clone(&self.notifier);
        let student_id = submission.student_id;
        let mut message = if submission.passed {
            format!("Task \"{}\" solved ✅", task_title)
        } else {
            format!("Task \"{}\" attempt failed", task_title)
        };
        if bonus_awarded > 0 {
            message.push_str(&format!(" (+{} points)", bonus_awarded));
        }
        if let Some(prize) = chest_reward {
            message.push_str(&format!(", streak chest: {:+} points", prize));
        }

        tokio::spawn(async move {
            if let Err(e) = notifier.notify(student_id, &message).await {
                log::warn!("notification for student {} dropped: {}", student_id, e);
            }
        });
    }
}

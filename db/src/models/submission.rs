use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};

/// Captured runner output is stored truncated to this many characters.
pub const STORED_OUTPUT_LIMIT: usize = 5000;

/// What `code` is replaced with once the retention window has lapsed.
pub const REDACTION_PLACEHOLDER: &str = "<code removed after retention window>";

/// Truncate to at most `limit` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Submission model representing the `submissions` table.
///
/// A row is created once per evaluation by the pipeline and afterwards only
/// touched by staff actions (approve / feedback) or the retention job.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub task_id: i64,
    pub code: String,
    pub passed: bool,
    pub output: String,
    pub submitted_at: DateTime<Utc>,
    pub approved: bool,
    pub bonus_awarded: i64,
    pub feedback: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::task::Entity",
        from = "Column::TaskId",
        to = "super::task::Column::Id"
    )]
    Task,
}

impl Related<super::task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Persist an evaluation result. Output is truncated to
    /// [`STORED_OUTPUT_LIMIT`] before it hits the database.
    pub async fn create(
        db: &DatabaseConnection,
        student_id: i64,
        task_id: i64,
        code: &str,
        passed: bool,
        output: &str,
    ) -> Result<Self, DbErr> {
        let active = ActiveModel {
            student_id: Set(student_id),
            task_id: Set(task_id),
            code: Set(code.to_string()),
            passed: Set(passed),
            output: Set(truncate_chars(output, STORED_OUTPUT_LIMIT).to_string()),
            submitted_at: Set(Utc::now()),
            approved: Set(false),
            bonus_awarded: Set(0),
            feedback: Set(None),
            ..Default::default()
        };
        active.insert(db).await
    }

    pub async fn get_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    /// All submissions by a student, newest first.
    pub async fn get_by_student_id(
        db: &DatabaseConnection,
        student_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .order_by_desc(Column::SubmittedAt)
            .all(db)
            .await
    }

    /// Staff approval. Records the staff-granted bonus on the row; crediting
    /// the ledger is the caller's job.
    pub async fn approve(db: &DatabaseConnection, id: i64, bonus: i64) -> Result<Self, DbErr> {
        let Some(submission) = Self::get_by_id(db, id).await? else {
            return Err(DbErr::RecordNotFound("Submission not found".into()));
        };
        let mut active = submission.into_active_model();
        active.approved = Set(true);
        active.bonus_awarded = Set(bonus);
        active.update(db).await
    }

    pub async fn unapprove(db: &DatabaseConnection, id: i64) -> Result<Self, DbErr> {
        let Some(submission) = Self::get_by_id(db, id).await? else {
            return Err(DbErr::RecordNotFound("Submission not found".into()));
        };
        let mut active = submission.into_active_model();
        active.approved = Set(false);
        active.bonus_awarded = Set(0);
        active.update(db).await
    }

    pub async fn set_feedback(
        db: &DatabaseConnection,
        id: i64,
        feedback: &str,
    ) -> Result<Self, DbErr> {
        let Some(submission) = Self::get_by_id(db, id).await? else {
            return Err(DbErr::RecordNotFound("Submission not found".into()));
        };
        let mut active = submission.into_active_model();
        active.feedback = Set(Some(feedback.to_string()));
        active.update(db).await
    }

    /// The cheat flag is carried in feedback text, not a dedicated column.
    pub fn is_flagged_cheater(&self) -> bool {
        self.feedback
            .as_deref()
            .map(|f| f.to_lowercase().contains("cheat"))
            .unwrap_or(false)
    }

    /// Retention pass: blank out code older than `retention_days`.
    /// Returns how many rows were redacted. Not on the submission hot path;
    /// meant to be run from a scheduled maintenance job.
    pub async fn redact_expired_code(
        db: &DatabaseConnection,
        retention_days: i64,
    ) -> Result<u64, DbErr> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let result = Entity::update_many()
            .col_expr(Column::Code, Expr::value(REDACTION_PLACEHOLDER))
            .filter(Column::SubmittedAt.lt(cutoff))
            .filter(Column::Code.ne(REDACTION_PLACEHOLDER))
            .exec(db)
            .await?;
        if result.rows_affected > 0 {
            log::info!("redacted code on {} expired submissions", result.rows_affected);
        }
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::Language;
    use crate::test_utils::setup_test_db;

    async fn seed_task(db: &DatabaseConnection) -> i64 {
        let topic = crate::models::topic::Model::create(db, "py: basics")
            .await
            .expect("Failed to create topic");
        crate::models::task::Model::create(
            db,
            topic.id,
            "Echo",
            "Print the input.",
            "print('✅')",
            Language::Python,
        )
        .await
        .expect("Failed to create task")
        .id
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        // Multi-byte glyphs must not be split.
        assert_eq!(truncate_chars("✅✅✅", 2), "✅✅");
    }

    #[tokio::test]
    async fn create_truncates_stored_output() {
        let db = setup_test_db().await;
        let task_id = seed_task(&db).await;

        let long_output = "x".repeat(STORED_OUTPUT_LIMIT + 500);
        let submission = Model::create(&db, 7, task_id, "print('hi')", true, &long_output)
            .await
            .expect("Failed to create submission");

        assert_eq!(submission.output.chars().count(), STORED_OUTPUT_LIMIT);
        assert!(!submission.approved);
        assert_eq!(submission.bonus_awarded, 0);
    }

    #[tokio::test]
    async fn staff_fields_and_cheat_flag() {
        let db = setup_test_db().await;
        let task_id = seed_task(&db).await;
        let submission = Model::create(&db, 7, task_id, "code", true, "✅")
            .await
            .expect("Failed to create submission");

        let approved = Model::approve(&db, submission.id, 3)
            .await
            .expect("Failed to approve");
        assert!(approved.approved);
        assert_eq!(approved.bonus_awarded, 3);
        assert!(!approved.is_flagged_cheater());

        let flagged = Model::set_feedback(&db, submission.id, "Cheating: copied solution")
            .await
            .expect("Failed to set feedback");
        assert!(flagged.is_flagged_cheater());

        let unapproved = Model::unapprove(&db, submission.id)
            .await
            .expect("Failed to unapprove");
        assert!(!unapproved.approved);
        assert_eq!(unapproved.bonus_awarded, 0);
    }

    #[tokio::test]
    async fn redaction_only_touches_expired_rows() {
        let db = setup_test_db().await;
        let task_id = seed_task(&db).await;

        let old = Model::create(&db, 1, task_id, "old code", false, "")
            .await
            .expect("Failed to create submission");
        let fresh = Model::create(&db, 2, task_id, "fresh code", false, "")
            .await
            .expect("Failed to create submission");

        // Age the first row past the window.
        let mut active = old.clone().into_active_model();
        active.submitted_at = Set(Utc::now() - Duration::days(10));
        active.update(&db).await.expect("Failed to backdate");

        let redacted = Model::redact_expired_code(&db, 7)
            .await
            .expect("Redaction failed");
        assert_eq!(redacted, 1);

        let old = Model::get_by_id(&db, old.id).await.unwrap().unwrap();
        let fresh = Model::get_by_id(&db, fresh.id).await.unwrap().unwrap();
        assert_eq!(old.code, REDACTION_PLACEHOLDER);
        assert_eq!(fresh.code, "fresh code");

        // A second pass finds nothing left to redact.
        let again = Model::redact_expired_code(&db, 7)
            .await
            .expect("Redaction failed");
        assert_eq!(again, 0);
    }
}

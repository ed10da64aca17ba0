use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use strum::EnumIter;

/// Languages the runner can evaluate.
#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "language_enum")]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[sea_orm(string_value = "python")]
    Python,
    #[sea_orm(string_value = "go")]
    #[serde(alias = "golang")]
    Go,
}

impl Default for Language {
    fn default() -> Self {
        Language::Python
    }
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Go => "go",
        }
    }

    /// Anything that is not recognizably Go falls back to Python, matching
    /// the runner's dispatch rule.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "go" | "golang" => Language::Go,
            _ => Language::Python,
        }
    }
}

/// Task model representing the `tasks` table.
///
/// Tasks are the instructor-authored catalog: a description shown to the
/// student plus the hidden test code the runner appends to submissions.
/// Rows are immutable once created.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub topic_id: i64,
    pub title: String,
    pub description: String,
    pub test_code: String,
    pub language: Language,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::topic::Entity",
        from = "Column::TopicId",
        to = "super::topic::Column::Id"
    )]
    Topic,
}

impl Related<super::topic::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Topic.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Create a new task in the catalog.
    pub async fn create(
        db: &DatabaseConnection,
        topic_id: i64,
        title: &str,
        description: &str,
        test_code: &str,
        language: Language,
    ) -> Result<Self, DbErr> {
        let active = ActiveModel {
            topic_id: Set(topic_id),
            title: Set(title.to_string()),
            description: Set(description.to_string()),
            test_code: Set(test_code.to_string()),
            language: Set(language),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        active.insert(db).await
    }

    /// Get a task by its ID.
    pub async fn get_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    /// Get all tasks under a topic.
    pub async fn get_by_topic_id(
        db: &DatabaseConnection,
        topic_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::TopicId.eq(topic_id))
            .all(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;

    #[test]
    fn language_parsing_defaults_to_python() {
        assert_eq!(Language::parse_or_default("go"), Language::Go);
        assert_eq!(Language::parse_or_default("Golang"), Language::Go);
        assert_eq!(Language::parse_or_default("python"), Language::Python);
        assert_eq!(Language::parse_or_default("haskell"), Language::Python);
        assert_eq!(Language::parse_or_default(""), Language::Python);
    }

    #[tokio::test]
    async fn create_and_fetch_task() {
        let db = setup_test_db().await;
        let topic = super::super::topic::Model::create(&db, "py: basics")
            .await
            .expect("Failed to create topic");

        let task = Model::create(
            &db,
            topic.id,
            "Sum of two numbers",
            "Write add(a, b).",
            "assert add(2, 3) == 5\nprint('✅')",
            Language::Python,
        )
        .await
        .expect("Failed to create task");

        let fetched = Model::get_by_id(&db, task.id)
            .await
            .expect("DB error")
            .expect("Task not found");
        assert_eq!(fetched.language, Language::Python);
        assert_eq!(fetched.title, "Sum of two numbers");

        let by_topic = Model::get_by_topic_id(&db, topic.id).await.expect("DB error");
        assert_eq!(by_topic.len(), 1);
    }
}

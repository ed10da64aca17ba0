use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, DbErr, Set};
use serde::{Deserialize, Serialize};

/// Category prefixes recognized when staff author a new topic.
///
/// A title like `go: goroutines` is expanded to `Go: goroutines` by looking
/// the prefix up here. Kept as one explicit table so the mapping is not
/// scattered across admin handlers.
pub const TOPIC_PREFIXES: &[(&str, &str)] = &[
    ("py", "Python"),
    ("go", "Go"),
    ("ds", "Data Structures"),
    ("algo", "Algorithms"),
    ("sql", "Databases"),
];

/// Topic model representing the `topics` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "topics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::task::Entity")]
    Task,
}

impl Related<super::task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Expands a known `<prefix>: rest` title using [`TOPIC_PREFIXES`].
/// Unknown prefixes (and titles without one) are returned unchanged.
pub fn expand_title(raw: &str) -> String {
    if let Some((prefix, rest)) = raw.split_once(':') {
        let key = prefix.trim().to_lowercase();
        if let Some((_, label)) = TOPIC_PREFIXES.iter().find(|(p, _)| *p == key) {
            return format!("{}: {}", label, rest.trim());
        }
    }
    raw.trim().to_string()
}

impl Model {
    /// Create a topic, expanding a recognized category prefix in the title.
    pub async fn create(db: &DatabaseConnection, raw_title: &str) -> Result<Self, DbErr> {
        let active = ActiveModel {
            title: Set(expand_title(raw_title)),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        active.insert(db).await
    }

    pub async fn get_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    pub async fn get_all(db: &DatabaseConnection) -> Result<Vec<Self>, DbErr> {
        Entity::find().all(db).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_prefixes() {
        assert_eq!(expand_title("go: goroutines"), "Go: goroutines");
        assert_eq!(expand_title("PY:  loops"), "Python: loops");
        assert_eq!(expand_title("algo: two pointers"), "Algorithms: two pointers");
    }

    #[test]
    fn leaves_unknown_titles_alone() {
        assert_eq!(expand_title("warmup week"), "warmup week");
        assert_eq!(expand_title("zz: mystery"), "zz: mystery");
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, IntoActiveModel, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};

/// Student account model representing the `student_accounts` table.
///
/// `id` is the external student identity. `bonus_points` is a signed
/// ledger: penalties and lost stakes may drive it negative, and no floor is
/// enforced here. `streak` counts consecutive passing submissions.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "student_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub bonus_points: i64,
    pub streak: i64,
    pub last_spin_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Fetch the account, creating a zeroed row on first touch.
    pub async fn get_or_create(db: &DatabaseConnection, student_id: i64) -> Result<Self, DbErr> {
        if let Some(account) = Entity::find_by_id(student_id).one(db).await? {
            return Ok(account);
        }
        let now = Utc::now();
        let active = ActiveModel {
            id: Set(student_id),
            bonus_points: Set(0),
            streak: Set(0),
            last_spin_date: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        active.insert(db).await
    }

    pub async fn balance(db: &DatabaseConnection, student_id: i64) -> Result<i64, DbErr> {
        Ok(Self::get_or_create(db, student_id).await?.bonus_points)
    }

    /// Apply `delta` to the ledger as a single relational UPDATE so the
    /// read-modify-write happens inside the store.
    pub async fn adjust_balance(
        db: &DatabaseConnection,
        student_id: i64,
        delta: i64,
    ) -> Result<i64, DbErr> {
        Self::get_or_create(db, student_id).await?;
        Entity::update_many()
            .col_expr(
                Column::BonusPoints,
                Expr::col(Column::BonusPoints).add(delta),
            )
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(student_id))
            .exec(db)
            .await?;
        Self::balance(db, student_id).await
    }

    pub async fn streak(db: &DatabaseConnection, student_id: i64) -> Result<i64, DbErr> {
        Ok(Self::get_or_create(db, student_id).await?.streak)
    }

    pub async fn set_streak(
        db: &DatabaseConnection,
        student_id: i64,
        streak: i64,
    ) -> Result<Self, DbErr> {
        let account = Self::get_or_create(db, student_id).await?;
        let mut active = account.into_active_model();
        active.streak = Set(streak);
        active.updated_at = Set(Utc::now());
        active.update(db).await
    }

    pub async fn last_spin_date(
        db: &DatabaseConnection,
        student_id: i64,
    ) -> Result<Option<NaiveDate>, DbErr> {
        Ok(Self::get_or_create(db, student_id).await?.last_spin_date)
    }

    pub async fn set_last_spin_date(
        db: &DatabaseConnection,
        student_id: i64,
        date: NaiveDate,
    ) -> Result<Self, DbErr> {
        let account = Self::get_or_create(db, student_id).await?;
        let mut active = account.into_active_model();
        active.last_spin_date = Set(Some(date));
        active.updated_at = Set(Utc::now());
        active.update(db).await
    }
}

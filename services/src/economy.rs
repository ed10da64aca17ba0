use chrono::Utc;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::EconomyError;
use db::models::student_account::Model as StudentAccount;

/// Points awarded for a timely pass on top of the doubled stake:
/// `1 + 2 × bet`. The formula nets out the stake itself, which stays spent.
pub const TIMED_AWARD_BASE: i64 = 1;

/// Discrete outcome wheel shared by the daily spin and streak chests:
/// `(points delta, weight)`. One losing slot, one blank, the rest pay out.
pub const SPIN_WHEEL: &[(i64, u32)] = &[(-3, 2), (0, 3), (1, 5), (2, 4), (5, 2), (10, 1)];

/// Draw one outcome from [`SPIN_WHEEL`]. Entropy comes from the caller so
/// call sites stay independent and tests can seed it.
pub fn spin_draw<R: Rng>(rng: &mut R) -> i64 {
    SPIN_WHEEL
        .choose_weighted(rng, |outcome| outcome.1)
        .map(|outcome| outcome.0)
        .expect("spin wheel weights are valid")
}

#[derive(Debug, Clone, Serialize)]
pub struct SpinOutcome {
    pub prize: i64,
    pub balance: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GambleOutcome {
    pub won: bool,
    pub amount: i64,
    pub balance: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassReward {
    pub streak: i64,
    pub chest: Option<i64>,
}

/// Balance ledger over `student_accounts`.
///
/// Check-then-mutate sequences (escrow, gamble, spin) are serialized per
/// student through a keyed lock map; different students never contend.
pub struct EconomyService {
    db: DatabaseConnection,
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl EconomyService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn student_lock(&self, student_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(student_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn balance(&self, student_id: i64) -> Result<i64, EconomyError> {
        Ok(StudentAccount::balance(&self.db, student_id).await?)
    }

    /// Take a stake out of the ledger up front. Rejects without mutating
    /// when the balance cannot cover it.
    pub async fn escrow(&self, student_id: i64, amount: i64) -> Result<(), EconomyError> {
        if amount < 0 {
            return Err(EconomyError::InvalidAmount(amount));
        }
        if amount == 0 {
            return Ok(());
        }
        let lock = self.student_lock(student_id).await;
        let _guard = lock.lock().await;

        let balance = StudentAccount::balance(&self.db, student_id).await?;
        if balance < amount {
            return Err(EconomyError::InsufficientFunds {
                balance,
                required: amount,
            });
        }
        StudentAccount::adjust_balance(&self.db, student_id, -amount).await?;
        Ok(())
    }

    /// Return a previously escrowed stake. Only ever called while the
    /// caller holds the live session that owns the escrow.
    pub async fn refund(&self, student_id: i64, amount: i64) -> Result<(), EconomyError> {
        if amount == 0 {
            return Ok(());
        }
        let lock = self.student_lock(student_id).await;
        let _guard = lock.lock().await;
        StudentAccount::adjust_balance(&self.db, student_id, amount).await?;
        Ok(())
    }

    /// Timely pass payout: `1 + 2 × bet`, credited on top of whatever the
    /// balance is after the stake was spent. Returns the amount awarded.
    pub async fn award_timed_bonus(
        &self,
        student_id: i64,
        bet: i64,
    ) -> Result<i64, EconomyError> {
        let amount = TIMED_AWARD_BASE + 2 * bet;
        let lock = self.student_lock(student_id).await;
        let _guard = lock.lock().await;
        StudentAccount::adjust_balance(&self.db, student_id, amount).await?;
        Ok(amount)
    }

    /// Bump the pass streak and, every fifth consecutive pass, draw a chest
    /// from the spin wheel and credit it.
    pub async fn record_pass(&self, student_id: i64) -> Result<PassReward, EconomyError> {
        let lock = self.student_lock(student_id).await;
        let _guard = lock.lock().await;

        let streak = StudentAccount::streak(&self.db, student_id).await? + 1;
        StudentAccount::set_streak(&self.db, student_id, streak).await?;

        let chest = if streak % 5 == 0 {
            let prize = spin_draw(&mut thread_rng());
            StudentAccount::adjust_balance(&self.db, student_id, prize).await?;
            Some(prize)
        } else {
            None
        };

        Ok(PassReward { streak, chest })
    }

    /// A failing submission ends the streak. Any stake stays forfeited.
    pub async fn record_fail(&self, student_id: i64) -> Result<(), EconomyError> {
        let lock = self.student_lock(student_id).await;
        let _guard = lock.lock().await;
        StudentAccount::set_streak(&self.db, student_id, 0).await?;
        Ok(())
    }

    /// One free spin of the wheel per calendar day.
    pub async fn daily_spin(&self, student_id: i64) -> Result<SpinOutcome, EconomyError> {
        let lock = self.student_lock(student_id).await;
        let _guard = lock.lock().await;

        let today = Utc::now().date_naive();
        if StudentAccount::last_spin_date(&self.db, student_id).await? == Some(today) {
            return Err(EconomyError::AlreadySpunToday);
        }

        let prize = spin_draw(&mut thread_rng());
        let balance = StudentAccount::adjust_balance(&self.db, student_id, prize).await?;
        StudentAccount::set_last_spin_date(&self.db, student_id, today).await?;

        Ok(SpinOutcome { prize, balance })
    }

    /// Double-or-nothing coin flip on `amount` points.
    pub async fn gamble(&self, student_id: i64, amount: i64) -> Result<GambleOutcome, EconomyError> {
        if amount <= 0 {
            return Err(EconomyError::InvalidAmount(amount));
        }
        let lock = self.student_lock(student_id).await;
        let _guard = lock.lock().await;

        let balance = StudentAccount::balance(&self.db, student_id).await?;
        if balance < amount {
            return Err(EconomyError::InsufficientFunds {
                balance,
                required: amount,
            });
        }

        let won = thread_rng().gen_bool(0.5);
        let delta = if won { amount } else { -amount };
        let balance = StudentAccount::adjust_balance(&self.db, student_id, delta).await?;

        Ok(GambleOutcome {
            won,
            amount,
            balance,
        })
    }

    /// Staff-side ledger adjustment (approval bonuses, penalties). No floor:
    /// penalties may drive the balance negative.
    pub async fn credit(&self, student_id: i64, delta: i64) -> Result<i64, EconomyError> {
        let lock = self.student_lock(student_id).await;
        let _guard = lock.lock().await;
        Ok(StudentAccount::adjust_balance(&self.db, student_id, delta).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::test_utils::setup_test_db;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn spin_draw_stays_on_the_wheel() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let prize = spin_draw(&mut rng);
            assert!(
                SPIN_WHEEL.iter().any(|(value, _)| *value == prize),
                "draw {} is not a wheel outcome",
                prize
            );
        }
    }

    #[tokio::test]
    async fn escrow_then_refund_restores_balance() {
        let db = setup_test_db().await;
        let economy = EconomyService::new(db.clone());
        economy.credit(1, 10).await.unwrap();

        economy.escrow(1, 4).await.expect("escrow rejected");
        assert_eq!(economy.balance(1).await.unwrap(), 6);

        economy.refund(1, 4).await.expect("refund failed");
        assert_eq!(economy.balance(1).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn escrow_rejects_without_mutation_when_broke() {
        let db = setup_test_db().await;
        let economy = EconomyService::new(db.clone());
        economy.credit(1, 3).await.unwrap();

        let result = economy.escrow(1, 5).await;
        assert!(matches!(
            result,
            Err(EconomyError::InsufficientFunds {
                balance: 3,
                required: 5
            })
        ));
        assert_eq!(economy.balance(1).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn concurrent_escrows_cannot_double_spend() {
        let db = setup_test_db().await;
        let economy = Arc::new(EconomyService::new(db.clone()));
        economy.credit(1, 10).await.unwrap();

        let first = {
            let economy = economy.clone();
            async move { economy.escrow(1, 10).await }
        };
        let second = {
            let economy = economy.clone();
            async move { economy.escrow(1, 10).await }
        };
        let (a, b) = tokio::join!(first, second);

        assert_eq!(
            a.is_ok() as u8 + b.is_ok() as u8,
            1,
            "exactly one of two concurrent escrows may pass the check"
        );
        assert_eq!(economy.balance(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn timed_award_formula() {
        let db = setup_test_db().await;
        let economy = EconomyService::new(db.clone());
        economy.credit(1, 10).await.unwrap();

        // Stake 2 points, then pass inside the window: net +5 vs pre-bet.
        economy.escrow(1, 2).await.unwrap();
        assert_eq!(economy.balance(1).await.unwrap(), 8);
        let awarded = economy.award_timed_bonus(1, 2).await.unwrap();
        assert_eq!(awarded, 5);
        assert_eq!(economy.balance(1).await.unwrap(), 13);
    }

    #[tokio::test]
    async fn late_pass_keeps_the_stake_spent() {
        let db = setup_test_db().await;
        let economy = EconomyService::new(db.clone());
        economy.credit(1, 10).await.unwrap();

        economy.escrow(1, 2).await.unwrap();
        // No award call happens for a late pass; the stake stays gone.
        assert_eq!(economy.balance(1).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn streak_increments_and_chest_fires_every_fifth_pass() {
        let db = setup_test_db().await;
        let economy = EconomyService::new(db.clone());

        for expected in 1..=4 {
            let reward = economy.record_pass(1).await.unwrap();
            assert_eq!(reward.streak, expected);
            assert!(reward.chest.is_none());
        }

        let before = economy.balance(1).await.unwrap();
        let reward = economy.record_pass(1).await.unwrap();
        assert_eq!(reward.streak, 5);
        let prize = reward.chest.expect("fifth pass grants a chest");
        assert_eq!(economy.balance(1).await.unwrap(), before + prize);

        economy.record_fail(1).await.unwrap();
        assert_eq!(
            db::models::student_account::Model::streak(&db, 1).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn daily_spin_once_per_day() {
        let db = setup_test_db().await;
        let economy = EconomyService::new(db.clone());

        let spin = economy.daily_spin(1).await.expect("first spin rejected");
        assert!(SPIN_WHEEL.iter().any(|(value, _)| *value == spin.prize));
        assert_eq!(spin.balance, spin.prize);

        let again = economy.daily_spin(1).await;
        assert!(matches!(again, Err(EconomyError::AlreadySpunToday)));
        assert_eq!(economy.balance(1).await.unwrap(), spin.balance);
    }

    #[tokio::test]
    async fn gamble_is_double_or_nothing() {
        let db = setup_test_db().await;
        let economy = EconomyService::new(db.clone());
        economy.credit(1, 10).await.unwrap();

        let outcome = economy.gamble(1, 4).await.expect("gamble rejected");
        if outcome.won {
            assert_eq!(outcome.balance, 14);
        } else {
            assert_eq!(outcome.balance, 6);
        }
        assert_eq!(economy.balance(1).await.unwrap(), outcome.balance);
    }

    #[tokio::test]
    async fn gamble_rejects_overdraw_without_mutation() {
        let db = setup_test_db().await;
        let economy = EconomyService::new(db.clone());
        economy.credit(1, 10).await.unwrap();

        let result = economy.gamble(1, 11).await;
        assert!(matches!(result, Err(EconomyError::InsufficientFunds { .. })));
        assert_eq!(economy.balance(1).await.unwrap(), 10);

        let zero = economy.gamble(1, 0).await;
        assert!(matches!(zero, Err(EconomyError::InvalidAmount(0))));
    }
}

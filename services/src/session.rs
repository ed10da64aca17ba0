use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Untimed,
    Timed,
}

/// One in-progress attempt: which mode the student opened the task in, when
/// the timer started, and how many points are staked on it.
///
/// A non-zero `bet` always means the points were already taken out of the
/// student's ledger when the session was opened.
#[derive(Debug, Clone)]
pub struct TaskSession {
    pub mode: SessionMode,
    pub started_at: DateTime<Utc>,
    pub bet: i64,
}

/// Ephemeral per-(student, task) attempt state. Nothing here is persisted:
/// sessions die on submit, on explicit reset, or with the process.
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<(i64, i64), TaskSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an untimed session, returning the record it replaced (if any).
    pub async fn open_untimed(&self, student_id: i64, task_id: i64) -> Option<TaskSession> {
        let session = TaskSession {
            mode: SessionMode::Untimed,
            started_at: Utc::now(),
            bet: 0,
        };
        self.inner
            .lock()
            .await
            .insert((student_id, task_id), session)
    }

    /// Insert a timed session with the given stake, returning the record it
    /// replaced (if any). Escrowing the stake is the caller's job.
    pub async fn open_timed(&self, student_id: i64, task_id: i64, bet: i64) -> Option<TaskSession> {
        let session = TaskSession {
            mode: SessionMode::Timed,
            started_at: Utc::now(),
            bet,
        };
        self.inner
            .lock()
            .await
            .insert((student_id, task_id), session)
    }

    pub async fn get(&self, student_id: i64, task_id: i64) -> Option<TaskSession> {
        self.inner.lock().await.get(&(student_id, task_id)).cloned()
    }

    /// Remove and return the session, whatever its mode.
    pub async fn take(&self, student_id: i64, task_id: i64) -> Option<TaskSession> {
        self.inner.lock().await.remove(&(student_id, task_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_are_keyed_per_student_and_task() {
        let store = SessionStore::new();
        store.open_untimed(1, 10).await;
        store.open_timed(1, 11, 3).await;

        assert_eq!(store.get(1, 10).await.unwrap().mode, SessionMode::Untimed);
        let timed = store.get(1, 11).await.unwrap();
        assert_eq!(timed.mode, SessionMode::Timed);
        assert_eq!(timed.bet, 3);
        assert!(store.get(2, 10).await.is_none());
    }

    #[tokio::test]
    async fn take_removes_the_session() {
        let store = SessionStore::new();
        store.open_timed(1, 10, 0).await;

        assert!(store.take(1, 10).await.is_some());
        assert!(store.take(1, 10).await.is_none());
        assert!(store.get(1, 10).await.is_none());
    }

    #[tokio::test]
    async fn reopening_returns_the_replaced_session() {
        let store = SessionStore::new();
        assert!(store.open_timed(1, 10, 5).await.is_none());
        let replaced = store.open_untimed(1, 10).await.unwrap();
        assert_eq!(replaced.bet, 5);
    }
}

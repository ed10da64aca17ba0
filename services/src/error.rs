use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EconomyError {
    #[error("insufficient points: balance is {balance}, required {required}")]
    InsufficientFunds { balance: i64, required: i64 },
    #[error("stake must be a positive amount, got {0}")]
    InvalidAmount(i64),
    #[error("daily spin already used today")]
    AlreadySpunToday,
    #[error(transparent)]
    Db(#[from] DbErr),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("task {0} not found")]
    TaskNotFound(i64),
    #[error(transparent)]
    Economy(#[from] EconomyError),
    #[error(transparent)]
    Db(#[from] DbErr),
}

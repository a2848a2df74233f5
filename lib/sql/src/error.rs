use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// A concurrent writer held the database and the bounded retry loop
    /// gave up. Retryable in principle; callers surface it as a conflict.
    #[error("transaction busy: {0}")]
    Busy(String),

    /// The transaction closure asked for a rollback. The caller that
    /// aborted carries the real error; this variant only signals the
    /// store to roll back.
    #[error("transaction rolled back")]
    RolledBack,
}

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailboxError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("message queue full for target agent")]
    QueueFull,
    #[error("message not found")]
    NotFound,
    #[error("server shutting down")]
    Shutdown,
    #[error("Lock error")]
    Lock,
}

pub type MailboxResult<T> = Result<T, MailboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_displays_its_fixed_message() {
        let err = MailboxError::Validation("agent_name is required");
        assert_eq!(err.to_string(), "agent_name is required");
        assert_eq!(MailboxError::NotFound.to_string(), "message not found");
    }
}

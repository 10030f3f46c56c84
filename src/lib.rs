pub mod config;
pub mod error;
pub mod messages;
pub mod registry;
pub mod server;
pub mod tools;

pub use config::Config;
pub use error::{MailboxError, MailboxResult};
pub use messages::{Delivery, Message};
pub use registry::{Backlog, Mailbox, Registry};
pub use tools::MailboxServer;

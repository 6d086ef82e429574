pub mod decoders;
pub mod gmail;
pub mod payload;
pub mod query;

pub use gmail::{GmailClient, Mailbox};

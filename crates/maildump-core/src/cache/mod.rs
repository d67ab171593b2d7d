//! Durable cache of previously observed messages.
//!
//! One record per message identity; survives across runs. Size is the sole
//! freshness signal: a record is stale iff it is absent or its stored size
//! differs from the server-reported one.

mod model;
mod repository;

pub use model::CachedMail;
pub use repository::MailRepository;

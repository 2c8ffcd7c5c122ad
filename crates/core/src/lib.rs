pub mod config;
pub mod duration;
pub mod error;
pub mod intent;
pub mod issue;
pub mod memory;
pub mod service;

pub use config::Config;
pub use error::*;
pub use intent::Intent;
pub use issue::*;
pub use memory::InMemoryIssueService;
pub use service::{IssueService, ServiceHandle};

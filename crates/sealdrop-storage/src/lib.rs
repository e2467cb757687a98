//! sealdrop-storage: object-store clients for sealdrop transfers
//!
//! Every backend hands out an opaque string reference for a stored blob and
//! returns the same bytes for that reference later. Nothing here is trusted
//! for integrity; callers verify digests themselves.

pub mod health;
pub mod operator;
pub mod store;
pub mod swarm;

pub use health::{check_health, is_healthy};
pub use operator::{build_from_config, build_operator, OpendalStore, S3Credentials};
pub use store::ObjectStore;
pub use swarm::SwarmStore;

pub mod context;
pub mod subscription;
pub mod types;

pub use context::RequestContext;
pub use types::{SubscriptionId, UserId};

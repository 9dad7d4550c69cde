pub mod metrics;
pub mod quota_manager;
pub mod redis;
pub mod resolver;
pub mod sync;

pub use metrics::*;
pub use quota_manager::*;
pub use self::redis::*;
pub use resolver::*;
pub use sync::*;

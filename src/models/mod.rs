pub mod context;
pub mod definition;
pub mod entity;
pub mod quota;
pub mod quota_override;

pub use context::*;
pub use definition::*;
pub use entity::*;
pub use quota::*;
pub use quota_override::*;

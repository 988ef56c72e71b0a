mod cache_entry;
mod ids;
mod list;
mod mode_group;
mod session;

pub use cache_entry::{CACHE_TTL_MILLIS, CacheEntry};
pub use ids::{CacheType, UserId, UserKey};
pub use list::{ListDescriptor, ListDescriptorError, ListFamily};
pub use mode_group::ModeGroup;
pub use session::{SessionRecord, SessionRecordError};

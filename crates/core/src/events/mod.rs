pub mod bus;
pub mod types;

pub use bus::NoticeBus;
pub use types::{PushMessage, SyncNotice};

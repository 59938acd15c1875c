//! Repository implementations, one per table.

pub mod activity;
pub mod file;
pub mod notification;
pub mod user;
pub mod version;

pub use activity::ActivityRepository;
pub use file::FileRepository;
pub use notification::NotificationRepository;
pub use user::UserRepository;
pub use version::VersionRepository;

// Domain layer modules
pub mod job;
pub mod notification;
pub mod track;

// Re-exports
pub use job::{JobError, MasteringJob, SongId};
pub use notification::{NotificationAction, StatusNotification};
pub use track::{TrackError, TrackId};

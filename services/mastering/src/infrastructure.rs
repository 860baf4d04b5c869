// Infrastructure layer modules
pub mod config;
pub mod logging;
pub mod scratch;
pub mod storage_ops;
pub mod webhook_client;

// Re-exports
pub use config::{ConfigError, ServiceConfig, WaitPolicy};
pub use logging::{init_local_logging, init_logging};
pub use scratch::ScratchFiles;
pub use storage_ops::{AwsStorageOps, StorageOps, StorageOpsError, wait_for_object};
pub use webhook_client::{NotifyError, StatusNotifier, WebhookClient};

pub mod bucket_store;

pub use bucket_store::{BucketStore, CleanupReport, StorageError, UploadRejection};

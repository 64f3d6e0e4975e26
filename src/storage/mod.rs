pub mod resolve;
pub mod s3;

pub use resolve::{resolve_image, resolve_video, MediaSource};
pub use s3::S3Store;

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },
    #[error("bucket {bucket} does not exist")]
    BucketNotFound { bucket: String },
    #[error("access to {bucket} denied")]
    AccessDenied { bucket: String },
    #[error("{op} failed: {message}")]
    Remote { op: &'static str, message: String },
    #[error("transfer of {0} interrupted")]
    Interrupted(String),
    #[error("storage client setup failed: {0}")]
    Setup(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Bucket + key of one remote asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub bucket: String,
    pub key: String,
}

impl RemoteObject {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for RemoteObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// The handful of object-storage calls background resolution needs.
pub trait ObjectStore {
    /// Size in bytes, from a metadata request.
    fn content_length(&self, object: &RemoteObject) -> Result<u64, StorageError>;
    /// Fetch the object into `dest`. `dest` only appears once the transfer
    /// completed. Clearing `running` aborts the transfer with `Interrupted`.
    fn download(&self, object: &RemoteObject, dest: &Path, running: &AtomicBool) -> Result<u64, StorageError>;
    /// Time-limited GET URL that a media reader can open directly.
    fn presign_get(&self, object: &RemoteObject, expires: Duration) -> Result<String, StorageError>;
    /// Succeeds when the bucket exists and can be listed.
    fn check_access(&self, bucket: &str) -> Result<(), StorageError>;
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::utils::file_utils;
    use std::cell::RefCell;
    use std::io::Write;
    use std::sync::atomic::Ordering;

    const CHUNK: usize = 4;

    /// In-memory store. Keys present in `objects` can be fetched; everything
    /// else is `NotFound`. `offline` makes every call fail as unreachable.
    /// `ctrl_c_after` clears the running flag once that many chunks landed.
    #[derive(Default)]
    pub struct FakeStore {
        pub objects: Vec<(RemoteObject, Vec<u8>)>,
        pub offline: bool,
        pub ctrl_c_after: Option<usize>,
        pub calls: RefCell<Vec<&'static str>>,
    }

    impl FakeStore {
        pub fn with_object(object: RemoteObject, body: &[u8]) -> Self {
            Self {
                objects: vec![(object, body.to_vec())],
                ..Self::default()
            }
        }

        fn lookup(&self, op: &'static str, object: &RemoteObject) -> Result<&[u8], StorageError> {
            self.calls.borrow_mut().push(op);
            if self.offline {
                return Err(StorageError::Remote {
                    op,
                    message: "dispatch failure".to_string(),
                });
            }
            self.objects
                .iter()
                .find(|(o, _)| o == object)
                .map(|(_, body)| body.as_slice())
                .ok_or_else(|| StorageError::NotFound {
                    bucket: object.bucket.clone(),
                    key: object.key.clone(),
                })
        }
    }

    impl ObjectStore for FakeStore {
        fn content_length(&self, object: &RemoteObject) -> Result<u64, StorageError> {
            Ok(self.lookup("head", object)?.len() as u64)
        }

        /// Writes `CHUNK` bytes at a time to `<dest>.part`, checking `running`
        /// before each one, like the S3 body stream.
        fn download(&self, object: &RemoteObject, dest: &Path, running: &AtomicBool) -> Result<u64, StorageError> {
            let body = self.lookup("download", object)?;
            let part = file_utils::part_path(dest);
            let mut file = std::fs::File::create(&part)?;
            for (n, chunk) in body.chunks(CHUNK).enumerate() {
                if self.ctrl_c_after == Some(n) {
                    running.store(false, Ordering::SeqCst);
                }
                if !running.load(Ordering::SeqCst) {
                    drop(file);
                    file_utils::discard_part(&part);
                    return Err(StorageError::Interrupted(object.to_string()));
                }
                file.write_all(chunk)?;
            }
            drop(file);
            file_utils::promote_part(&part, dest).map_err(|e| StorageError::Setup(e.to_string()))?;
            Ok(body.len() as u64)
        }

        fn presign_get(&self, object: &RemoteObject, expires: Duration) -> Result<String, StorageError> {
            self.lookup("presign", object)?;
            Ok(format!(
                "https://{}.s3.amazonaws.com/{}?X-Amz-Expires={}",
                object.bucket,
                object.key,
                expires.as_secs()
            ))
        }

        fn check_access(&self, bucket: &str) -> Result<(), StorageError> {
            self.calls.borrow_mut().push("list");
            if self.offline || !self.objects.iter().any(|(o, _)| o.bucket == bucket) {
                return Err(StorageError::AccessDenied {
                    bucket: bucket.to_string(),
                });
            }
            Ok(())
        }
    }
}

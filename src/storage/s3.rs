use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Runtime;

use super::{ObjectStore, RemoteObject, StorageError};
use crate::utils::file_utils;

/// Blocking facade over the async S3 client.
///
/// Owns a current-thread runtime; every call blocks the caller until the
/// request finishes. Credentials and region come from the default AWS chain
/// (env, profile, instance metadata).
pub struct S3Store {
    runtime: Runtime,
    client: Client,
}

impl S3Store {
    pub fn connect() -> Result<Self, StorageError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StorageError::Setup(e.to_string()))?;
        let sdk_config = runtime.block_on(aws_config::load_defaults(BehaviorVersion::latest()));
        let client = Client::new(&sdk_config);
        tracing::debug!(
            "S3 client ready (region {})",
            sdk_config
                .region()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unset".to_string())
        );
        Ok(Self { runtime, client })
    }

    async fn download_to(
        &self,
        object: &RemoteObject,
        part: &Path,
        running: &AtomicBool,
    ) -> Result<u64, StorageError> {
        let mut response = self
            .client
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .send()
            .await
            .map_err(|e| classify("GetObject", object, e))?;

        let mut file = tokio::fs::File::create(part).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.body.try_next().await.map_err(|e| StorageError::Remote {
            op: "GetObject body",
            message: e.to_string(),
        })? {
            if !running.load(Ordering::SeqCst) {
                tracing::warn!("Download of {} interrupted after {} bytes.", object, written);
                return Err(StorageError::Interrupted(object.to_string()));
            }
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

impl ObjectStore for S3Store {
    fn content_length(&self, object: &RemoteObject) -> Result<u64, StorageError> {
        let head = self
            .runtime
            .block_on(
                self.client
                    .head_object()
                    .bucket(&object.bucket)
                    .key(&object.key)
                    .send(),
            )
            .map_err(|e| classify("HeadObject", object, e))?;
        Ok(head.content_length().unwrap_or(0).max(0) as u64)
    }

    fn download(&self, object: &RemoteObject, dest: &Path, running: &AtomicBool) -> Result<u64, StorageError> {
        file_utils::ensure_parent_dir(dest).map_err(|e| StorageError::Setup(e.to_string()))?;
        let part = file_utils::part_path(dest);
        match self.runtime.block_on(self.download_to(object, &part, running)) {
            Ok(written) => {
                file_utils::promote_part(&part, dest).map_err(|e| StorageError::Setup(e.to_string()))?;
                Ok(written)
            }
            Err(e) => {
                file_utils::discard_part(&part);
                Err(e)
            }
        }
    }

    fn presign_get(&self, object: &RemoteObject, expires: Duration) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(expires).map_err(|e| StorageError::Remote {
            op: "presign",
            message: e.to_string(),
        })?;
        let request = self
            .runtime
            .block_on(
                self.client
                    .get_object()
                    .bucket(&object.bucket)
                    .key(&object.key)
                    .presigned(presigning),
            )
            .map_err(|e| classify("presign GetObject", object, e))?;
        Ok(request.uri().to_string())
    }

    fn check_access(&self, bucket: &str) -> Result<(), StorageError> {
        let object = RemoteObject::new(bucket, "");
        self.runtime
            .block_on(self.client.list_objects_v2().bucket(bucket).max_keys(1).send())
            .map_err(|e| classify("ListObjectsV2", &object, e))?;
        Ok(())
    }
}

fn classify<E, R>(op: &'static str, object: &RemoteObject, err: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.as_service_error().and_then(|e| e.code());
    from_code(op, object, code, || DisplayErrorContext(&err).to_string())
}

/// Map an S3 error code onto `StorageError`. A missing bucket is reported on
/// its own, never as a missing `bucket/` object.
fn from_code(
    op: &'static str,
    object: &RemoteObject,
    code: Option<&str>,
    message: impl FnOnce() -> String,
) -> StorageError {
    match code {
        Some("NoSuchBucket") => StorageError::BucketNotFound {
            bucket: object.bucket.clone(),
        },
        Some("NoSuchKey") | Some("NotFound") if !object.key.is_empty() => StorageError::NotFound {
            bucket: object.bucket.clone(),
            key: object.key.clone(),
        },
        // HEAD and bucket-level requests carry no body, so a missing bucket
        // surfaces as a bare 404.
        Some("NotFound") => StorageError::BucketNotFound {
            bucket: object.bucket.clone(),
        },
        Some("AccessDenied") | Some("Forbidden") => StorageError::AccessDenied {
            bucket: object.bucket.clone(),
        },
        _ => StorageError::Remote { op, message: message() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> String {
        "service error".to_string()
    }

    #[test]
    fn missing_bucket_is_not_reported_as_object() {
        let bucket = RemoteObject::new("vesna-camera-control-storage", "");
        let err = from_code("ListObjectsV2", &bucket, Some("NoSuchBucket"), message);
        assert!(matches!(err, StorageError::BucketNotFound { .. }));
        assert_eq!(err.to_string(), "bucket vesna-camera-control-storage does not exist");

        let err = from_code("ListObjectsV2", &bucket, Some("NotFound"), message);
        assert!(matches!(err, StorageError::BucketNotFound { .. }));
    }

    #[test]
    fn missing_key_names_the_object() {
        let object = RemoteObject::new("bucket", "Sahara2EU-002.webm");
        let err = from_code("HeadObject", &object, Some("NotFound"), message);
        assert_eq!(err.to_string(), "object bucket/Sahara2EU-002.webm not found");

        let err = from_code("GetObject", &object, Some("NoSuchBucket"), message);
        assert!(matches!(err, StorageError::BucketNotFound { .. }));
    }

    #[test]
    fn other_codes_keep_the_service_message() {
        let object = RemoteObject::new("bucket", "key");
        assert!(matches!(
            from_code("GetObject", &object, Some("AccessDenied"), message),
            StorageError::AccessDenied { .. }
        ));
        let err = from_code("GetObject", &object, Some("SlowDown"), message);
        assert_eq!(err.to_string(), "GetObject failed: service error");
        let err = from_code("GetObject", &object, None, message);
        assert!(matches!(err, StorageError::Remote { op: "GetObject", .. }));
    }
}

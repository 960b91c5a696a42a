//! Common test utilities for end-to-end backup tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;
use vault_backup::config::StorageConfig;
use vault_backup::error::{RemoteError, RemoteErrorKind};
use vault_backup::storage::{ObjectStore, ObjectUpload};
use vault_backup::{BackupTarget, RemoteStorageClient};

pub const BUCKET: &str = "test-vault-backups";

/// Temporary vault on disk
pub struct TestVault {
    pub _temp_dir: TempDir,
    pub target: BackupTarget,
}

impl TestVault {
    /// Create a vault holding `files` (relative path, contents)
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("MyVault");
        std::fs::create_dir(&root).unwrap();
        for (relative, contents) in files {
            write_file(&root, relative, contents);
        }
        let target = BackupTarget::new(&root).unwrap();
        Self {
            _temp_dir: temp_dir,
            target,
        }
    }

    pub fn root(&self) -> &Path {
        self.target.root()
    }
}

pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// An object as the fake store received it
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub storage_class: String,
    pub encrypted: bool,
    pub metadata: HashMap<String, String>,
}

#[derive(Default)]
struct FakeState {
    buckets: HashSet<String>,
    encrypted_buckets: HashSet<String>,
    objects: HashMap<String, StoredObject>,
    calls: Vec<&'static str>,
}

/// In-memory object store that records every call
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<FakeState>,
}

impl FakeStore {
    pub fn with_bucket(name: &str) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().buckets.insert(name.to_string());
        store
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|call| **call == operation).count()
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    pub fn is_encrypted(&self, bucket: &str) -> bool {
        self.state.lock().unwrap().encrypted_buckets.contains(bucket)
    }

    fn record(&self, operation: &'static str) -> std::sync::MutexGuard<'_, FakeState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(operation);
        state
    }
}

fn not_found(operation: &'static str, code: &str) -> RemoteError {
    RemoteError::new(
        RemoteErrorKind::NotFound,
        operation,
        Some(code.to_string()),
        "not found",
    )
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn list_buckets(&self) -> Result<Vec<String>, RemoteError> {
        let state = self.record("ListBuckets");
        Ok(state.buckets.iter().cloned().collect())
    }

    async fn head_bucket(&self, bucket: &str) -> Result<(), RemoteError> {
        let state = self.record("HeadBucket");
        if state.buckets.contains(bucket) {
            Ok(())
        } else {
            Err(not_found("HeadBucket", "NotFound"))
        }
    }

    async fn create_bucket(
        &self,
        bucket: &str,
        _location_constraint: Option<String>,
    ) -> Result<(), RemoteError> {
        let mut state = self.record("CreateBucket");
        if !state.buckets.insert(bucket.to_string()) {
            return Err(RemoteError::new(
                RemoteErrorKind::AlreadyExistsOwned,
                "CreateBucket",
                Some("BucketAlreadyOwnedByYou".to_string()),
                "already owned by you",
            ));
        }
        Ok(())
    }

    async fn put_bucket_encryption(&self, bucket: &str) -> Result<(), RemoteError> {
        let mut state = self.record("PutBucketEncryption");
        state.encrypted_buckets.insert(bucket.to_string());
        Ok(())
    }

    async fn put_object(&self, upload: ObjectUpload) -> Result<(), RemoteError> {
        let mut state = self.record("PutObject");
        if !state.buckets.contains(&upload.bucket) {
            return Err(not_found("PutObject", "NoSuchBucket"));
        }
        let body = std::fs::read(&upload.path).map_err(|e| {
            RemoteError::new(RemoteErrorKind::Other, "PutObject", None, e.to_string())
        })?;
        state.objects.insert(
            upload.key,
            StoredObject {
                body,
                storage_class: upload.storage_class,
                encrypted: upload.encrypted,
                metadata: upload.metadata,
            },
        );
        Ok(())
    }
}

pub fn storage_config() -> StorageConfig {
    StorageConfig {
        bucket: BUCKET.to_string(),
        region: "ap-northeast-1".to_string(),
        key_prefix: "obsidian-backup".to_string(),
        storage_class: "DEEP_ARCHIVE".to_string(),
        endpoint_url: None,
    }
}

pub fn client(store: FakeStore) -> RemoteStorageClient<FakeStore> {
    RemoteStorageClient::new(store, &storage_config()).unwrap()
}

/// Entry name -> contents of a zip held in memory
pub fn zip_entries(body: &[u8]) -> HashMap<String, Vec<u8>> {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(body)).unwrap();
    let mut entries = HashMap::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).unwrap();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();
        entries.insert(entry.name().to_string(), contents);
    }
    entries
}

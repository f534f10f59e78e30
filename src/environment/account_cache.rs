// ABOUTME: On-disk cache mapping access key ids to the account they belong to.
// ABOUTME: A cache only: unreadable files read as empty and unwritable files are skipped.

use crate::provider::Account;
use std::collections::BTreeMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum AccountCacheError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub struct AccountCache {
    path: PathBuf,
    max_entries: usize,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for AccountCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCache")
            .field("path", &self.path)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl AccountCache {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached account for `access_key_id`, resolving and storing it on a miss.
    pub async fn fetch<F, Fut, E>(&self, access_key_id: &str, resolver: F) -> Result<Option<Account>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Account>, E>>,
        E: From<AccountCacheError>,
    {
        if let Some(account) = self.get(access_key_id).await? {
            tracing::debug!(account = %account.account_id, "retrieved account from disk cache");
            return Ok(Some(account));
        }

        let account = resolver().await?;
        if let Some(account) = &account {
            self.put(access_key_id, account.clone()).await?;
        }
        Ok(account)
    }

    pub async fn get(&self, access_key_id: &str) -> Result<Option<Account>, AccountCacheError> {
        Ok(self.load_map().await?.remove(access_key_id))
    }

    pub async fn put(&self, access_key_id: &str, account: Account) -> Result<(), AccountCacheError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load_map().await?;
        if map.len() >= self.max_entries {
            map.clear();
        }
        map.insert(access_key_id.to_string(), account);
        self.save_map(&map).await
    }

    async fn load_map(&self) -> Result<BTreeMap<String, Account>, AccountCacheError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                return Ok(BTreeMap::new());
            }
            Err(source) => {
                return Err(AccountCacheError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        // Concurrent writers can leave a truncated file behind.
        Ok(serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::debug!(path = %self.path.display(), "ignoring unreadable account cache: {e}");
            BTreeMap::new()
        }))
    }

    async fn save_map(&self, map: &BTreeMap<String, Account>) -> Result<(), AccountCacheError> {
        let result = async {
            if let Some(parent) = self.path.parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await?;
            }
            let json = serde_json::to_string_pretty(map).map_err(std::io::Error::other)?;
            tokio::fs::write(&self.path, json).await
        }
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::NotFound | ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem
                ) =>
            {
                tracing::debug!(path = %self.path.display(), "account cache not writable: {e}");
                Ok(())
            }
            Err(source) => Err(AccountCacheError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str) -> Account {
        Account {
            account_id: id.to_string(),
            partition: "aws".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AccountCache::new(dir.path().join("accounts.json"), 10);
        assert_eq!(cache.get("AKIA1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        std::fs::write(&path, "{\"AKIA1\": {\"accountId\": ").unwrap();
        let cache = AccountCache::new(&path, 10);
        assert_eq!(cache.get("AKIA1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_then_get_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AccountCache::new(dir.path().join("nested/cache/accounts.json"), 10);
        cache.put("AKIA1", account("111111111111")).await.unwrap();
        assert_eq!(cache.get("AKIA1").await.unwrap(), Some(account("111111111111")));
    }

    #[tokio::test]
    async fn full_cache_is_reset_before_insert() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AccountCache::new(dir.path().join("accounts.json"), 2);
        cache.put("AKIA1", account("1")).await.unwrap();
        cache.put("AKIA2", account("2")).await.unwrap();
        cache.put("AKIA3", account("3")).await.unwrap();

        assert_eq!(cache.get("AKIA1").await.unwrap(), None);
        assert_eq!(cache.get("AKIA2").await.unwrap(), None);
        assert_eq!(cache.get("AKIA3").await.unwrap(), Some(account("3")));
    }

    #[tokio::test]
    async fn fetch_resolves_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AccountCache::new(dir.path().join("accounts.json"), 10);

        let first: Result<_, AccountCacheError> = cache
            .fetch("AKIA1", || async { Ok(Some(account("1"))) })
            .await;
        assert_eq!(first.unwrap(), Some(account("1")));

        let second: Result<_, AccountCacheError> = cache
            .fetch("AKIA1", || async { Ok(Some(account("2"))) })
            .await;
        assert_eq!(second.unwrap(), Some(account("1")));
    }
}

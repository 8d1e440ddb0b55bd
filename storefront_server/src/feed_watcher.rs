use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use log::*;
use storefront_engine::bank_feeds::{load_feed_configs, HttpBankFeed};

use crate::errors::ServerError;

/// Tracks the modification time of the bank feed file so that edits are picked up without a restart.
#[derive(Debug, Clone)]
pub struct FeedWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl FeedWatcher {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into(), last_modified: None }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// True the first time the file is seen, and whenever its modification time moves on after that.
    pub fn has_changed(&mut self) -> bool {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) => {
                warn!("🪛️ Cannot read bank feed file {}. {e}", self.path.display());
                return false;
            },
        };
        if self.last_modified == Some(modified) {
            return false;
        }
        self.last_modified = Some(modified);
        true
    }
}

/// Reads the feed file and builds a client for every enabled feed. A feed whose client cannot be built is skipped.
pub fn load_feeds(path: &Path) -> Result<Vec<HttpBankFeed>, ServerError> {
    let configs = load_feed_configs(path)?;
    let feeds = configs
        .into_iter()
        .filter_map(|config| {
            let name = config.name.clone();
            HttpBankFeed::new(config).map_err(|e| error!("🪛️ Bank feed '{name}' is misconfigured. {e}")).ok()
        })
        .collect::<Vec<_>>();
    info!("🪛️ Loaded {} bank feeds from {}", feeds.len(), path.display());
    Ok(feeds)
}

#[cfg(test)]
mod test {
    use std::{io::Write, time::Duration};

    use storefront_engine::bank_feeds::BankFeed;
    use tempfile::NamedTempFile;

    use super::*;

    const FEEDS: &str = r#"[
        {
            "name": "vcb",
            "url": "http://localhost:9999/history",
            "transactions_path": "data.items",
            "fields": { "id": "ref", "amount": "amount", "description": "memo" }
        },
        {
            "name": "acb",
            "enabled": false,
            "url": "http://localhost:9999/acb",
            "fields": { "id": "id", "amount": "value", "description": "text" }
        },
        {
            "name": "broken",
            "url": "http://localhost:9999/broken",
            "headers": { "bad header": "x" },
            "fields": { "id": "id", "amount": "value", "description": "text" }
        }
    ]"#;

    #[test]
    fn watcher_sees_changes() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[]").unwrap();
        let mut watcher = FeedWatcher::new(file.path());
        assert!(watcher.has_changed());
        assert!(!watcher.has_changed());
        file.as_file().set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();
        assert!(watcher.has_changed());
        assert!(!watcher.has_changed());
    }

    #[test]
    fn missing_file_is_not_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = FeedWatcher::new(dir.path().join("feeds.json"));
        assert!(!watcher.has_changed());
    }

    #[test]
    fn enabled_and_valid_feeds_are_loaded() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FEEDS.as_bytes()).unwrap();
        let feeds = load_feeds(file.path()).unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].name(), "vcb");
    }

    #[test]
    fn bad_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(matches!(load_feeds(file.path()), Err(ServerError::BankFeedError(_))));
    }
}

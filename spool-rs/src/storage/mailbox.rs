use crate::error::{MailError, Result};
use crate::storage::message::{self, Message, MESSAGE_EXT, PARTIAL_EXT};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One message as shown by LIST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxEntry {
    /// Zero-based position used by READ and DEL
    pub index: usize,
    /// Backing file name
    pub name: String,
    pub sender: String,
    pub subject: String,
}

/// Result of listing a mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxListing {
    /// The user has never received mail, so no directory exists
    UnknownUser,
    Entries(Vec<MailboxEntry>),
}

impl MailboxListing {
    /// Number of messages in the mailbox
    pub fn count(&self) -> usize {
        match self {
            MailboxListing::UnknownUser => 0,
            MailboxListing::Entries(entries) => entries.len(),
        }
    }
}

/// Per-user mailbox directories under a spool root
///
/// Messages are addressed by their position in the sorted list of message
/// files. File names sort chronologically, so new mail is appended at the
/// end and indices only move when a message is deleted.
pub struct MailboxStore {
    base_path: PathBuf,
    /// Serializes choosing a file name and committing it
    send_lock: Mutex<()>,
}

impl MailboxStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            send_lock: Mutex::new(()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn mailbox_path(&self, user: &str) -> PathBuf {
        self.base_path.join(user)
    }

    /// Store a message in the receiver's mailbox, creating it if needed
    ///
    /// Returns the backing file name.
    pub async fn send(&self, message: &Message) -> Result<String> {
        let mailbox_path = self.mailbox_path(&message.receiver);

        if !fs::try_exists(&mailbox_path).await.unwrap_or(false) {
            fs::create_dir_all(&mailbox_path).await.map_err(|e| {
                MailError::Storage(format!(
                    "Failed to create directory {:?}: {}",
                    mailbox_path, e
                ))
            })?;
            info!("Created mailbox {}", mailbox_path.display());
        }

        let _guard = self.send_lock.lock().await;

        // New mail must sort after everything already stored
        let floor = self
            .message_names(&mailbox_path)
            .await?
            .unwrap_or_default()
            .iter()
            .filter_map(|name| message::file_name_prefix(name))
            .max()
            .map_or(0, |last| last.saturating_add(1));

        let filename = message::generate_file_name(floor);
        let partial_path = mailbox_path.join(format!("{}.{}", filename, PARTIAL_EXT));
        let final_path = mailbox_path.join(&filename);

        // Write under a non-message name first, then rename into place
        fs::write(&partial_path, message.to_file_contents())
            .await
            .map_err(|e| {
                MailError::Storage(format!("Failed to write {:?}: {}", partial_path, e))
            })?;

        if let Err(e) = fs::rename(&partial_path, &final_path).await {
            let _ = fs::remove_file(&partial_path).await;
            return Err(MailError::Storage(format!(
                "Failed to commit {:?}: {}",
                final_path, e
            )));
        }

        info!(
            "Stored message from {} to {} as {}",
            message.sender,
            message.receiver,
            final_path.display()
        );

        Ok(filename)
    }

    /// List the messages of a user's mailbox in positional order
    pub async fn list(&self, user: &str) -> Result<MailboxListing> {
        let mailbox_path = self.mailbox_path(user);

        let Some(names) = self.message_names(&mailbox_path).await? else {
            debug!("No mailbox for {}", user);
            return Ok(MailboxListing::UnknownUser);
        };

        let mut entries = Vec::with_capacity(names.len());
        for (index, name) in names.into_iter().enumerate() {
            let path = mailbox_path.join(&name);
            let (sender, subject) = match Self::load(&path).await {
                Ok(msg) => (msg.sender, msg.subject),
                Err(e) => {
                    warn!("Unreadable message {}: {}", path.display(), e);
                    (String::from("unknown"), name.clone())
                }
            };

            entries.push(MailboxEntry {
                index,
                name,
                sender,
                subject,
            });
        }

        Ok(MailboxListing::Entries(entries))
    }

    /// Read the message at `index`
    pub async fn read(&self, user: &str, index: usize) -> Result<Message> {
        let path = self.resolve(user, index).await?;
        debug!("Reading {}", path.display());
        Self::load(&path).await
    }

    /// Delete the message at `index`
    pub async fn delete(&self, user: &str, index: usize) -> Result<()> {
        let path = self.resolve(user, index).await?;

        fs::remove_file(&path).await.map_err(|e| {
            MailError::Storage(format!("Failed to delete {:?}: {}", path, e))
        })?;

        info!("Deleted message {} of {} ({})", index, user, path.display());
        Ok(())
    }

    async fn resolve(&self, user: &str, index: usize) -> Result<PathBuf> {
        let mailbox_path = self.mailbox_path(user);

        let names = self
            .message_names(&mailbox_path)
            .await?
            .ok_or_else(|| MailError::NotFound(format!("mailbox of {}", user)))?;

        names
            .get(index)
            .map(|name| mailbox_path.join(name))
            .ok_or_else(|| {
                MailError::NotFound(format!(
                    "message {} in mailbox of {} ({} messages)",
                    index,
                    user,
                    names.len()
                ))
            })
    }

    async fn load(path: &Path) -> Result<Message> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|e| MailError::Storage(format!("Failed to open {:?}: {}", path, e)))?;

        Message::parse(&contents)
    }

    /// Sorted names of the regular message files, or `None` if the mailbox
    /// directory does not exist
    async fn message_names(&self, mailbox_path: &Path) -> Result<Option<Vec<String>>> {
        let mut dir = match fs::read_dir(mailbox_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(MailError::Storage(format!(
                    "Failed to open mailbox {:?}: {}",
                    mailbox_path, e
                )))
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            if message::is_message_file(&name) {
                names.push(name);
            } else if !name.ends_with(PARTIAL_EXT) {
                debug!("Ignoring foreign file {} (not .{})", name, MESSAGE_EXT);
            }
        }

        names.sort();
        Ok(Some(names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, MailboxStore) {
        let dir = TempDir::new().unwrap();
        let store = MailboxStore::new(dir.path().join("spool"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_send_creates_mailbox_lazily() {
        let (_dir, store) = store();

        assert_eq!(store.list("bob").await.unwrap(), MailboxListing::UnknownUser);

        store
            .send(&Message::new("alice", "bob", "Hi", "hello"))
            .await
            .unwrap();

        assert!(store.base_path().join("bob").is_dir());
        assert_eq!(store.list("bob").await.unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_send_increments_count_and_read_returns_body() {
        let (_dir, store) = store();

        for i in 0..3 {
            let before = store.list("bob").await.unwrap().count();
            store
                .send(&Message::new("alice", "bob", format!("s{}", i), format!("body {}", i)))
                .await
                .unwrap();
            assert_eq!(store.list("bob").await.unwrap().count(), before + 1);
        }

        for i in 0..3 {
            let msg = store.read("bob", i).await.unwrap();
            assert_eq!(msg.body, format!("body {}", i));
            assert_eq!(msg.subject, format!("s{}", i));
        }
    }

    #[tokio::test]
    async fn test_same_sender_and_subject_do_not_overwrite() {
        let (_dir, store) = store();

        store
            .send(&Message::new("alice", "bob", "Same", "first"))
            .await
            .unwrap();
        store
            .send(&Message::new("alice", "bob", "Same", "second"))
            .await
            .unwrap();

        assert_eq!(store.list("bob").await.unwrap().count(), 2);
        assert_eq!(store.read("bob", 0).await.unwrap().body, "first");
        assert_eq!(store.read("bob", 1).await.unwrap().body, "second");
    }

    #[tokio::test]
    async fn test_send_after_clock_step_back_appends() {
        let (_dir, store) = store();
        store
            .send(&Message::new("alice", "bob", "s", "first"))
            .await
            .unwrap();

        // Date the stored message an hour ahead of the clock
        let mailbox = store.base_path().join("bob");
        let MailboxListing::Entries(entries) = store.list("bob").await.unwrap() else {
            panic!("expected entries");
        };
        let future = u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap() + 3_600_000_000;
        let future_name = format!("{:020}-seeded.msg", future);
        std::fs::rename(mailbox.join(&entries[0].name), mailbox.join(&future_name)).unwrap();

        let name = store
            .send(&Message::new("alice", "bob", "s", "second"))
            .await
            .unwrap();

        assert_eq!(message::file_name_prefix(&name), Some(future + 1));
        assert_eq!(store.read("bob", 0).await.unwrap().body, "first");
        assert_eq!(store.read("bob", 1).await.unwrap().body, "second");
    }

    #[tokio::test]
    async fn test_concurrent_sends_keep_order_stable() {
        let (_dir, store) = store();
        let store = std::sync::Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .send(&Message::new("alice", "bob", "s", format!("{}", i)))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let MailboxListing::Entries(entries) = store.list("bob").await.unwrap() else {
            panic!("expected entries");
        };
        let prefixes: Vec<u64> = entries
            .iter()
            .filter_map(|entry| message::file_name_prefix(&entry.name))
            .collect();
        assert_eq!(prefixes.len(), 8);
        assert!(prefixes.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn test_list_entries_carry_metadata() {
        let (_dir, store) = store();
        store
            .send(&Message::new("alice", "bob", "Lunch", "?"))
            .await
            .unwrap();

        let MailboxListing::Entries(entries) = store.list("bob").await.unwrap() else {
            panic!("expected entries");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 0);
        assert_eq!(entries[0].sender, "alice");
        assert_eq!(entries[0].subject, "Lunch");
        assert!(entries[0].name.ends_with(".msg"));
    }

    #[tokio::test]
    async fn test_empty_mailbox_counts_zero() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.base_path().join("carol")).unwrap();

        let listing = store.list("carol").await.unwrap();
        assert_eq!(listing, MailboxListing::Entries(vec![]));
        assert_eq!(listing.count(), 0);
    }

    #[tokio::test]
    async fn test_count_ignores_directories_and_foreign_files() {
        let (_dir, store) = store();
        let mailbox = store.base_path().join("bob");
        std::fs::create_dir_all(mailbox.join("subdir")).unwrap();
        std::fs::write(mailbox.join("notes.txt"), "x").unwrap();
        std::fs::write(mailbox.join("00000000000000000001-a.msg.tmp"), "x").unwrap();

        store
            .send(&Message::new("alice", "bob", "Hi", "hello"))
            .await
            .unwrap();

        assert_eq!(store.list("bob").await.unwrap().count(), 1);
        assert_eq!(store.read("bob", 0).await.unwrap().body, "hello");
    }

    #[tokio::test]
    async fn test_read_errors() {
        let (_dir, store) = store();

        assert!(matches!(
            store.read("nobody", 0).await,
            Err(MailError::NotFound(_))
        ));

        store
            .send(&Message::new("alice", "bob", "Hi", "hello"))
            .await
            .unwrap();

        assert!(matches!(store.read("bob", 1).await, Err(MailError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_never_returns_deleted_content() {
        let (_dir, store) = store();
        for body in ["one", "two", "three"] {
            store
                .send(&Message::new("alice", "bob", "s", body))
                .await
                .unwrap();
        }

        store.delete("bob", 1).await.unwrap();

        assert_eq!(store.list("bob").await.unwrap().count(), 2);
        assert_eq!(store.read("bob", 0).await.unwrap().body, "one");
        assert_eq!(store.read("bob", 1).await.unwrap().body, "three");
        assert!(store.read("bob", 2).await.is_err());

        store.delete("bob", 1).await.unwrap();
        store.delete("bob", 0).await.unwrap();
        assert!(store.delete("bob", 0).await.is_err());
        assert_eq!(store.list("bob").await.unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_send_fails_when_spool_root_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("spool");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = MailboxStore::new(&blocker);
        let result = store.send(&Message::new("alice", "bob", "Hi", "x")).await;
        assert!(matches!(result, Err(MailError::Storage(_))));
    }
}

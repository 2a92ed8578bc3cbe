use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use construkt_core::domain::conversation::ConversationMemory;

use super::{ConversationRepository, RepositoryError};

const MAX_PLAIN_ID_LEN: usize = 64;

/// Stores one JSON document per user under `dir`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous document intact.
pub struct FileConversationRepository {
    dir: PathBuf,
}

#[derive(Deserialize)]
struct StoredUser {
    user_id: String,
}

impl FileConversationRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir.join(file_name_for(user_id))
    }
}

/// Plain ids map to `{id}.json`; anything that could escape the directory or
/// collide on a case-insensitive filesystem is hashed. Plain ids are
/// lowercase, so `User-A` hashes while `user-a` does not.
fn file_name_for(user_id: &str) -> String {
    let plain = !user_id.is_empty()
        && user_id.len() <= MAX_PLAIN_ID_LEN
        && user_id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if plain {
        format!("{user_id}.json")
    } else {
        let digest = blake3::hash(user_id.as_bytes()).to_hex();
        format!("u-{}.json", &digest.as_str()[..32])
    }
}

#[async_trait::async_trait]
impl ConversationRepository for FileConversationRepository {
    async fn load(&self, user_id: &str) -> Result<Option<ConversationMemory>, RepositoryError> {
        let path = self.path_for(user_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let memory: ConversationMemory = serde_json::from_slice(&bytes)
            .map_err(|e| RepositoryError::Decode(format!("{}: {e}", path.display())))?;
        Ok(Some(memory))
    }

    async fn save(&self, memory: &ConversationMemory) -> Result<(), RepositoryError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let payload = serde_json::to_vec_pretty(memory)
            .map_err(|e| RepositoryError::Encode(e.to_string()))?;
        let path = self.path_for(&memory.user_id);
        let staging = path.with_extension("json.tmp");

        tokio::fs::write(&staging, payload).await?;
        tokio::fs::rename(&staging, &path).await?;
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<bool, RepositoryError> {
        match tokio::fs::remove_file(self.path_for(user_id)).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    async fn list_user_ids(&self) -> Result<Vec<String>, RepositoryError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut user_ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<StoredUser>(&bytes) {
                Ok(stored) => user_ids.push(stored.user_id),
                Err(error) => {
                    tracing::warn!(
                        event_name = "conversation.unreadable_document",
                        path = %path.display(),
                        error = %error,
                        "skipping conversation document without a user id"
                    );
                }
            }
        }

        user_ids.sort();
        Ok(user_ids)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use construkt_core::domain::conversation::{ConversationMemory, MemoryMutation, MessageRecord};
    use construkt_core::domain::intent::Intent;
    use construkt_core::domain::product::{CategoryId, ProductId, ProductRecord};
    use rust_decimal::Decimal;

    use super::{file_name_for, FileConversationRepository};
    use crate::repositories::{ConversationRepository, RepositoryError};

    #[tokio::test]
    async fn saved_memory_loads_back_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = FileConversationRepository::new(dir.path().join("conversations"));
        let mut memory = ConversationMemory::new("user-1");
        memory.apply(MemoryMutation::AppendMessage(MessageRecord::user("hi", Intent::Greeting)), 20);
        memory.apply(MemoryMutation::RecordIntent { intent: Intent::Greeting, confidence: 0.95 }, 20);

        repo.save(&memory).await.expect("save");
        let loaded = repo.load("user-1").await.expect("load");

        assert_eq!(loaded, Some(memory));
    }

    #[tokio::test]
    async fn missing_user_loads_as_none_and_deletes_as_false() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = FileConversationRepository::new(dir.path());

        assert_eq!(repo.load("nobody").await.expect("load"), None);
        assert!(!repo.delete("nobody").await.expect("delete"));
    }

    #[tokio::test]
    async fn delete_removes_the_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = FileConversationRepository::new(dir.path());
        repo.save(&ConversationMemory::new("user-2")).await.expect("save");

        assert!(repo.delete("user-2").await.expect("delete"));
        assert_eq!(repo.load("user-2").await.expect("load"), None);
    }

    #[tokio::test]
    async fn corrupt_document_is_a_decode_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = FileConversationRepository::new(dir.path());
        std::fs::write(dir.path().join("user-3.json"), b"{not json").expect("write corrupt file");

        let error = repo.load("user-3").await.expect_err("corrupt document must fail");

        assert!(matches!(error, RepositoryError::Decode(_)));
    }

    #[tokio::test]
    async fn unsafe_ids_are_hashed_and_still_listed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = FileConversationRepository::new(dir.path());
        let awkward = "../web:U123/../../etc";

        repo.save(&ConversationMemory::new(awkward)).await.expect("save awkward id");
        repo.save(&ConversationMemory::new("plain_user")).await.expect("save plain id");
        std::fs::write(dir.path().join("notes.txt"), b"ignored").expect("write stray file");

        let file_name = file_name_for(awkward);
        assert!(file_name.starts_with("u-"));
        assert!(!file_name.contains('/'));
        assert!(dir.path().join(&file_name).exists());

        let users = repo.list_user_ids().await.expect("list");
        assert_eq!(users, vec![awkward.to_owned(), "plain_user".to_owned()]);
        assert!(repo.load(awkward).await.expect("load awkward").is_some());
    }

    #[tokio::test]
    async fn listing_a_missing_directory_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = FileConversationRepository::new(dir.path().join("never-created"));

        assert!(repo.list_user_ids().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn ids_differing_only_in_case_get_distinct_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = FileConversationRepository::new(dir.path());

        assert_ne!(
            file_name_for("User-A").to_lowercase(),
            file_name_for("user-a").to_lowercase()
        );
        assert_eq!(file_name_for("user-a"), "user-a.json");

        repo.save(&ConversationMemory::new("User-A")).await.expect("save upper");
        repo.save(&ConversationMemory::new("user-a")).await.expect("save lower");

        let users = repo.list_user_ids().await.expect("list");
        assert_eq!(users, vec!["User-A".to_owned(), "user-a".to_owned()]);
    }

    #[tokio::test]
    async fn prices_are_written_as_plain_numbers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = FileConversationRepository::new(dir.path());
        let cement = ProductRecord {
            id: ProductId(1),
            name: "Portland Cement".to_owned(),
            description: String::new(),
            price: Decimal::new(1250, 2),
            unit: "bag".to_owned(),
            stock_quantity: 150,
            category_id: CategoryId(1),
            category_name: "Concrete & Cement".to_owned(),
            supplier_id: None,
            supplier_name: None,
            attributes: BTreeMap::new(),
        };
        let mut memory = ConversationMemory::new("user-4");
        memory.apply(MemoryMutation::SetCurrentProduct(cement), 20);

        repo.save(&memory).await.expect("save");
        let raw = std::fs::read(dir.path().join("user-4.json")).expect("read document");
        let document: serde_json::Value = serde_json::from_slice(&raw).expect("valid json");

        assert_eq!(document["current_product"]["price"], serde_json::json!(12.5));
        assert_eq!(repo.load("user-4").await.expect("load"), Some(memory));
    }
}

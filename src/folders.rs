//! Folder operations.

use serde_json::Value;
use std::sync::Arc;

use crate::error::{require_non_empty, Result};
use crate::models::{ChatSummary, Folder, FolderForm};
use crate::normalize::{fetch, Payload};
use crate::transport::{path_segment, ApiRequest, Transport};

/// Folder CRUD plus listing the chats a folder holds.
#[derive(Clone)]
pub struct Folders {
    transport: Arc<dyn Transport>,
}

impl Folders {
    pub(crate) fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn list(&self) -> Result<Payload<Vec<Folder>>> {
        tracing::debug!("listing folders");
        fetch(
            self.transport.as_ref(),
            ApiRequest::get("/api/v1/folders/"),
            "folder list",
        )
        .await
    }

    pub async fn create(&self, name: &str) -> Result<Payload<Folder>> {
        require_non_empty("folder name", name)?;
        let request = ApiRequest::post_json("/api/v1/folders/", &FolderForm { name })?;
        let folder = fetch(self.transport.as_ref(), request, "folder create").await?;
        tracing::info!(name, "created folder");
        Ok(folder)
    }

    pub async fn get(&self, folder_id: &str) -> Result<Payload<Folder>> {
        let segment = path_segment("folder id", folder_id)?;
        fetch(
            self.transport.as_ref(),
            ApiRequest::get(format!("/api/v1/folders/{segment}")),
            &format!("folder get {folder_id}"),
        )
        .await
    }

    pub async fn delete(&self, folder_id: &str) -> Result<()> {
        let segment = path_segment("folder id", folder_id)?;
        fetch::<Value>(
            self.transport.as_ref(),
            ApiRequest::delete(format!("/api/v1/folders/{segment}")),
            &format!("folder delete {folder_id}"),
        )
        .await?;
        tracing::info!(folder_id, "deleted folder");
        Ok(())
    }

    /// Chats stored in the folder, read from the folder's `items.chats`.
    pub async fn list_chats(&self, folder_id: &str) -> Result<Vec<ChatSummary>> {
        let chats = match self.get(folder_id).await? {
            Payload::Typed(folder) => folder.items.map(|items| items.chats).unwrap_or_default(),
            Payload::Raw(value) => chats_from_raw(&value),
            Payload::Empty => Vec::new(),
        };
        tracing::info!(folder_id, count = chats.len(), "listed chats in folder");
        Ok(chats)
    }
}

fn chats_from_raw(value: &Value) -> Vec<ChatSummary> {
    let Some(items) = value.pointer("/items/chats").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed chat entry in folder");
                None
            }
        })
        .collect()
}

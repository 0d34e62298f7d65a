//! Data models exchanged with the Open WebUI server.
//!
//! Record types keep every property the server sends: anything not named
//! here lands in an `extra` map and is written back unchanged, so a chat
//! fetched, modified and persisted again loses nothing.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// An optional request field with three distinguishable states.
///
/// `Unset` fields are omitted from the payload (pair with
/// `#[serde(skip_serializing_if = "Field::is_unset")]`); `Cleared` is sent as
/// an explicit `null`; `Provided` sends the value.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Provided(T),
    Cleared,
    Unset,
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Unset
    }
}

impl<T> Field<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Field::Unset)
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Field::Provided(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Provided(v),
            None => Field::Unset,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Provided(v) => v.serialize(serializer),
            Field::Cleared | Field::Unset => serializer.serialize_none(),
        }
    }
}

// ── Folders ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub items: Option<FolderItems>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderItems {
    #[serde(default)]
    pub chats: Vec<ChatSummary>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FolderForm<'a> {
    pub name: &'a str,
}

// ── Chats ────────────────────────────────────────────────────────────────

/// Author of a message.
///
/// Roles the server stores beyond the three the SDK writes (`tool`,
/// `function`, ...) are carried through as [`Role::Other`] and written
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    #[serde(untagged)]
    Other(String),
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Other(role) => write!(f, "{role}"),
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            extra: Map::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// The conversation document stored under a chat's `chat` property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A stored chat as returned by the chat endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub chat: ChatBody,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Lightweight chat listing entry (`id` + `title`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatForm<'a> {
    pub chat: &'a ChatBody,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub folder_id: Field<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatTurn],
    pub stream: bool,
}

/// OpenAI-style completion response; only the first choice is read.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CompletionChoice {
    pub message: CompletionMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

// ── Knowledge bases and files ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub files: Option<Vec<FileRecord>>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct KnowledgeForm<'a> {
    pub name: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub meta: Option<FileMeta>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileRecord {
    /// Best available display name for the file.
    pub fn display_name(&self) -> &str {
        self.meta
            .as_ref()
            .and_then(|m| m.name.as_deref())
            .or(self.filename.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FileIdForm<'a> {
    pub file_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FileContentForm<'a> {
    pub content: &'a str,
}

// ── Retrieval ────────────────────────────────────────────────────────────

/// Tuning knobs for a retrieval query. `Unset` knobs are left to the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryOptions {
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub k: Field<u32>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub k_reranker: Field<u32>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub r: Field<f64>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub hybrid: Field<bool>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    pub hybrid_bm25_weight: Field<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QueryCollectionForm<'a> {
    pub collection_names: &'a [String],
    pub query: &'a str,
    #[serde(flatten)]
    pub options: &'a QueryOptions,
}

/// Raw retrieval response: one inner list per collection, rank-ordered.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct QueryResult {
    #[serde(default)]
    pub documents: Vec<Vec<Option<String>>>,
    #[serde(default)]
    pub metadatas: Vec<Vec<Option<Map<String, Value>>>>,
    #[serde(default)]
    pub distances: Vec<Vec<Option<f64>>>,
}

impl QueryResult {
    /// Flattens the nested lists into chunks, preserving rank order.
    pub fn into_chunks(self) -> Vec<RetrievedChunk> {
        let mut chunks = Vec::new();
        for (group, docs) in self.documents.into_iter().enumerate() {
            let metas = self.metadatas.get(group);
            let dists = self.distances.get(group);
            for (i, doc) in docs.into_iter().enumerate() {
                let Some(content) = doc else { continue };
                let source_ref = metas
                    .and_then(|m| m.get(i))
                    .and_then(|m| m.as_ref())
                    .and_then(source_ref_from_metadata);
                let distance = dists.and_then(|d| d.get(i)).copied().flatten();
                chunks.push(RetrievedChunk {
                    content,
                    source_ref,
                    distance,
                });
            }
        }
        chunks
    }
}

fn source_ref_from_metadata(meta: &Map<String, Value>) -> Option<String> {
    ["source", "name", "file_id"]
        .iter()
        .find_map(|key| meta.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// A piece of knowledge-base content returned by a retrieval query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub source_ref: Option<String>,
    pub distance: Option<f64>,
}

// ── Batch results ────────────────────────────────────────────────────────

/// Outcome of a directory upload. Failures never abort sibling uploads.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadReport {
    pub uploaded: Vec<UploadedFile>,
    pub failed: Vec<UploadFailure>,
}

impl UploadReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    pub path: PathBuf,
    pub file: FileRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of deleting every file in a knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionSummary {
    pub successful: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_tristate_serialization() {
        let options = QueryOptions {
            k: Field::Provided(5),
            r: Field::Cleared,
            ..Default::default()
        };
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value, json!({"k": 5, "r": null}));
    }

    #[test]
    fn test_field_from_option() {
        assert_eq!(Field::from(Some(3)), Field::Provided(3));
        assert_eq!(Field::<i32>::from(None), Field::Unset);
        assert!(Field::<i32>::default().is_unset());
        assert_eq!(Field::Provided(2).as_option(), Some(&2));
        assert_eq!(Field::<i32>::Cleared.as_option(), None);
    }

    #[test]
    fn test_unknown_roles_round_trip() {
        let stored = json!({
            "models": ["m"],
            "messages": [
                {"role": "user", "content": "weather?"},
                {"role": "tool", "content": "{\"temp\": 21}", "tool_call_id": "call-1"},
                {"role": "assistant", "content": "21 degrees"}
            ]
        });
        let body: ChatBody = serde_json::from_value(stored.clone()).unwrap();
        assert_eq!(body.messages[0].role, Role::User);
        assert_eq!(body.messages[1].role, Role::Other("tool".into()));
        assert_eq!(body.messages[1].role.to_string(), "tool");
        assert_eq!(serde_json::to_value(&body).unwrap(), stored);
    }

    #[test]
    fn test_chat_form_omits_unset_folder() {
        let body = ChatBody::default();
        let form = ChatForm {
            chat: &body,
            folder_id: Field::Unset,
        };
        let value = serde_json::to_value(&form).unwrap();
        assert!(value.get("folder_id").is_none());

        let form = ChatForm {
            chat: &body,
            folder_id: Field::Cleared,
        };
        let value = serde_json::to_value(&form).unwrap();
        assert_eq!(value["folder_id"], Value::Null);
    }

    #[test]
    fn test_chat_body_keeps_unknown_properties() {
        let raw = json!({
            "title": "T",
            "models": ["m"],
            "messages": [{"role": "user", "content": "hi", "id": "abc"}],
            "history": {"currentId": "abc"},
            "tags": ["x"]
        });
        let body: ChatBody = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(body.messages[0].extra["id"], "abc");
        assert_eq!(serde_json::to_value(&body).unwrap(), raw);
    }

    #[test]
    fn test_query_form_flattens_options() {
        let names = vec!["kb1".to_string()];
        let options = QueryOptions {
            hybrid: Field::Provided(true),
            ..Default::default()
        };
        let form = QueryCollectionForm {
            collection_names: &names,
            query: "q",
            options: &options,
        };
        assert_eq!(
            serde_json::to_value(&form).unwrap(),
            json!({"collection_names": ["kb1"], "query": "q", "hybrid": true})
        );
    }

    #[test]
    fn test_query_result_flattening() {
        let raw = json!({
            "documents": [["A", "B"], ["C"]],
            "metadatas": [[{"source": "a.md"}, {"name": "b.md"}], [{"file_id": "f3"}]],
            "distances": [[0.1, 0.2], [0.3]]
        });
        let result: QueryResult = serde_json::from_value(raw).unwrap();
        let chunks = result.into_chunks();
        let contents: Vec<_> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["A", "B", "C"]);
        assert_eq!(chunks[0].source_ref.as_deref(), Some("a.md"));
        assert_eq!(chunks[1].source_ref.as_deref(), Some("b.md"));
        assert_eq!(chunks[2].source_ref.as_deref(), Some("f3"));
        assert_eq!(chunks[2].distance, Some(0.3));
    }

    #[test]
    fn test_query_result_tolerates_missing_metadata() {
        let raw = json!({"documents": [["only"]]});
        let result: QueryResult = serde_json::from_value(raw).unwrap();
        let chunks = result.into_chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source_ref, None);
        assert_eq!(chunks[0].distance, None);
    }

    #[test]
    fn test_file_display_name() {
        let file: FileRecord = serde_json::from_value(json!({
            "id": "f1",
            "filename": "raw.txt",
            "meta": {"name": "Nice.txt"}
        }))
        .unwrap();
        assert_eq!(file.display_name(), "Nice.txt");

        let file: FileRecord = serde_json::from_value(json!({"id": "f2"})).unwrap();
        assert_eq!(file.display_name(), "f2");
    }
}

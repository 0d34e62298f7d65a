//! Chat operations.
//!
//! Creating or continuing a chat is a two-step exchange: ask the model for
//! a reply, then persist the conversation. When knowledge bases are named,
//! the model sees a prompt augmented with retrieved context while the
//! stored history only ever records the prompt the user typed.

use serde_json::Value;
use std::sync::Arc;

use crate::error::{require_non_empty, Error, Result};
use crate::knowledge::Knowledge;
use crate::models::{
    Chat, ChatBody, ChatForm, ChatSummary, ChatTurn, CompletionRequest, CompletionResponse, Field,
    QueryOptions,
};
use crate::normalize::{fetch, Payload};
use crate::rag::{self, AssembledPrompt};
use crate::transport::{path_segment, ApiRequest, Transport};

/// Knowledge bases to ground a prompt in, plus query tuning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    pub knowledge_ids: Vec<String>,
    pub options: QueryOptions,
}

impl Retrieval {
    pub fn new(knowledge_ids: Vec<String>) -> Self {
        Self {
            knowledge_ids,
            options: QueryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// Arguments for [`Chats::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewChat {
    pub model: String,
    pub prompt: String,
    pub folder_id: Option<String>,
    pub retrieval: Retrieval,
}

impl NewChat {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            folder_id: None,
            retrieval: Retrieval::default(),
        }
    }

    pub fn in_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    pub fn with_retrieval(mut self, retrieval: Retrieval) -> Self {
        self.retrieval = retrieval;
        self
    }
}

#[derive(Clone)]
pub struct Chats {
    transport: Arc<dyn Transport>,
    knowledge: Knowledge,
}

impl Chats {
    pub(crate) fn new(transport: Arc<dyn Transport>, knowledge: Knowledge) -> Self {
        Self {
            transport,
            knowledge,
        }
    }

    /// All chats of the authenticated user.
    pub async fn list(&self) -> Result<Payload<Vec<ChatSummary>>> {
        fetch(
            self.transport.as_ref(),
            ApiRequest::get("/api/v1/chats/list"),
            "chat list",
        )
        .await
    }

    pub async fn get(&self, chat_id: &str) -> Result<Payload<Chat>> {
        let segment = path_segment("chat id", chat_id)?;
        fetch(
            self.transport.as_ref(),
            ApiRequest::get(format!("/api/v1/chats/{segment}")),
            &format!("chat get {chat_id}"),
        )
        .await
    }

    /// Message history of a chat, oldest first.
    pub async fn messages(&self, chat_id: &str) -> Result<Vec<ChatTurn>> {
        let label = format!("chat get {chat_id}");
        let chat = self.get(chat_id).await?.into_typed(&label)?;
        Ok(chat.chat.messages)
    }

    /// Starts a chat: one model reply, then the two-turn history is stored.
    pub async fn create(&self, request: NewChat) -> Result<Payload<Chat>> {
        require_non_empty("model", &request.model)?;
        require_non_empty("prompt", &request.prompt)?;
        tracing::info!(model = %request.model, "creating chat");

        let assembled = self.assemble(&request.prompt, &request.retrieval).await?;
        let reply = self
            .complete(
                &request.model,
                &[ChatTurn::user(assembled.for_model.as_str())],
                "completion",
            )
            .await?;

        let body = ChatBody {
            models: vec![request.model.clone()],
            messages: vec![
                ChatTurn::user(assembled.for_history),
                ChatTurn::assistant(reply),
            ],
            ..ChatBody::default()
        };
        let form = ChatForm {
            chat: &body,
            folder_id: Field::from(request.folder_id),
        };
        let chat = fetch(
            self.transport.as_ref(),
            ApiRequest::post_json("/api/v1/chats/new", &form)?,
            "chat create",
        )
        .await?;
        tracing::info!("chat created");
        Ok(chat)
    }

    /// Adds a user turn and the model's reply to an existing chat.
    ///
    /// The model receives the stored history plus the (possibly augmented)
    /// prompt; the stored history gains the original prompt and the reply.
    pub async fn continue_chat(
        &self,
        chat_id: &str,
        prompt: &str,
        retrieval: &Retrieval,
    ) -> Result<Payload<Chat>> {
        require_non_empty("chat id", chat_id)?;
        require_non_empty("prompt", prompt)?;
        tracing::info!(chat_id, "continuing chat");

        let assembled = self.assemble(prompt, retrieval).await?;

        let label = format!("chat get {chat_id}");
        let chat = self.get(chat_id).await?.into_typed(&label)?;
        let model = chat
            .chat
            .models
            .first()
            .cloned()
            .ok_or_else(|| Error::UnexpectedResponse {
                label: label.clone(),
                message: "chat has no model recorded".to_string(),
            })?;

        let mut outgoing = chat.chat.messages.clone();
        outgoing.push(ChatTurn::user(assembled.for_model.as_str()));
        let reply = self
            .complete(&model, &outgoing, &format!("completion for chat {chat_id}"))
            .await?;

        let mut body = chat.chat;
        body.messages.push(ChatTurn::user(assembled.for_history));
        body.messages.push(ChatTurn::assistant(reply));
        self.update(chat_id, &body, chat.folder_id, "chat update")
            .await
    }

    /// Sets a chat's title. Every other stored property is kept.
    pub async fn rename(&self, chat_id: &str, title: &str) -> Result<Payload<Chat>> {
        require_non_empty("chat id", chat_id)?;
        require_non_empty("title", title)?;

        let label = format!("chat get {chat_id}");
        let chat = self.get(chat_id).await?.into_typed(&label)?;
        let mut body = chat.chat;
        body.title = Some(title.to_string());
        let updated = self
            .update(chat_id, &body, chat.folder_id, "chat rename")
            .await?;
        tracing::info!(chat_id, title, "renamed chat");
        Ok(updated)
    }

    pub async fn delete(&self, chat_id: &str) -> Result<()> {
        let segment = path_segment("chat id", chat_id)?;
        fetch::<Value>(
            self.transport.as_ref(),
            ApiRequest::delete(format!("/api/v1/chats/{segment}")),
            &format!("chat delete {chat_id}"),
        )
        .await?;
        tracing::info!(chat_id, "deleted chat");
        Ok(())
    }

    async fn assemble(&self, prompt: &str, retrieval: &Retrieval) -> Result<AssembledPrompt> {
        rag::assemble(
            &self.knowledge,
            prompt,
            &retrieval.knowledge_ids,
            &retrieval.options,
        )
        .await
    }

    async fn update(
        &self,
        chat_id: &str,
        body: &ChatBody,
        folder_id: Option<String>,
        label: &str,
    ) -> Result<Payload<Chat>> {
        let segment = path_segment("chat id", chat_id)?;
        let form = ChatForm {
            chat: body,
            folder_id: Field::from(folder_id),
        };
        fetch(
            self.transport.as_ref(),
            ApiRequest::post_json(format!("/api/v1/chats/{segment}"), &form)?,
            label,
        )
        .await
    }

    async fn complete(&self, model: &str, messages: &[ChatTurn], label: &str) -> Result<String> {
        let request = CompletionRequest {
            model,
            messages,
            stream: false,
        };
        let response: CompletionResponse = fetch(
            self.transport.as_ref(),
            ApiRequest::post_json("/openai/chat/completions", &request)?,
            label,
        )
        .await?
        .into_typed(label)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::UnexpectedResponse {
                label: label.to_string(),
                message: "completion has no message content".to_string(),
            })
    }
}

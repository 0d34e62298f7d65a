//! `owui chat ...` command handlers.

use anyhow::Result;
use serde_json::json;

use crate::chats::{NewChat, Retrieval};
use crate::client::OpenWebUi;
use crate::output::{self, Output};

pub async fn run_create(client: &OpenWebUi, out: Output, request: NewChat) -> Result<()> {
    let chat = client.chats.create(request).await?;
    out.payload(&chat, |c| format!("Created chat.\n{}", output::render_chat(c)))
}

pub async fn run_continue(
    client: &OpenWebUi,
    out: Output,
    chat_id: &str,
    prompt: &str,
    retrieval: &Retrieval,
) -> Result<()> {
    let chat = client.chats.continue_chat(chat_id, prompt, retrieval).await?;
    out.payload(&chat, output::render_chat)
}

/// Prints the message history of one chat.
pub async fn run_messages(client: &OpenWebUi, out: Output, chat_id: &str) -> Result<()> {
    let messages = client.chats.messages(chat_id).await?;
    if out.is_json() {
        return out.print_json(&messages);
    }
    print!("{}", output::render_messages(&messages));
    Ok(())
}

pub async fn run_list_all(client: &OpenWebUi, out: Output) -> Result<()> {
    let chats = client.chats.list().await?;
    out.payload(&chats, |c| output::render_chat_summaries(c, "No chats found."))
}

pub async fn run_rename(client: &OpenWebUi, out: Output, chat_id: &str, title: &str) -> Result<()> {
    let chat = client.chats.rename(chat_id, title).await?;
    out.payload(&chat, |_| format!("Renamed chat '{chat_id}' to '{title}'.\n"))
}

pub async fn run_delete(client: &OpenWebUi, out: Output, chat_id: &str, yes: bool) -> Result<()> {
    let question = format!("Delete chat '{chat_id}'?");
    if !output::should_proceed(&out, yes, &question)? {
        return Ok(());
    }
    client.chats.delete(chat_id).await?;
    out.success(
        &format!("Deleted chat '{chat_id}'."),
        json!({ "chat_id": chat_id }),
    )
}

//! `owui folder ...` command handlers.

use anyhow::Result;
use serde_json::json;

use crate::client::OpenWebUi;
use crate::output::{self, Output};

pub async fn run_list(client: &OpenWebUi, out: Output) -> Result<()> {
    let folders = client.folders.list().await?;
    out.payload(&folders, |f| output::render_folders(f))
}

pub async fn run_create(client: &OpenWebUi, out: Output, name: &str) -> Result<()> {
    let folder = client.folders.create(name).await?;
    out.payload(&folder, |f| {
        format!("Created folder.\n{}", output::render_folder(f))
    })
}

pub async fn run_list_chats(client: &OpenWebUi, out: Output, folder_id: &str) -> Result<()> {
    let chats = client.folders.list_chats(folder_id).await?;
    if out.is_json() {
        return out.print_json(&chats);
    }
    if !chats.is_empty() {
        println!("Chats in folder '{folder_id}':");
    }
    print!(
        "{}",
        output::render_chat_summaries(&chats, &format!("No chats found in folder '{folder_id}'."))
    );
    Ok(())
}

pub async fn run_delete(client: &OpenWebUi, out: Output, folder_id: &str, yes: bool) -> Result<()> {
    let question = format!("Delete folder '{folder_id}'?");
    if !output::should_proceed(&out, yes, &question)? {
        return Ok(());
    }
    client.folders.delete(folder_id).await?;
    out.success(
        &format!("Deleted folder '{folder_id}'."),
        json!({ "folder_id": folder_id }),
    )
}

use anyhow::{Context as _, Result};
use colored::Colorize;
use orgboard_sdk::{ApiClient, Channel, ChatBackend, ChatError, ChatMessage, ChatRoom, ChatSession};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use super::Context;
use crate::ui;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn rooms(ctx: &Context) -> Result<()> {
    ctx.require_sign_in()?;
    let rooms = ctx.api.list_rooms().await?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&rooms)?);
        return Ok(());
    }
    if rooms.is_empty() {
        ui::print_info("No chat rooms");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = rooms
        .iter()
        .map(|r| vec![r.id.to_string(), r.name.clone(), r.unread_count.to_string()])
        .collect();
    ui::print_table(&["ID", "NAME", "UNREAD"], &rows);
    Ok(())
}

pub async fn join(ctx: &Context, room_id: i64) -> Result<()> {
    ctx.require_sign_in()?;
    let room = ctx
        .api
        .list_rooms()
        .await?
        .into_iter()
        .find(|r| r.id == room_id)
        .with_context(|| format!("Chat room {} not found", room_id))?;

    let client_config = ctx.config.client_config();
    let channel = Channel::new(
        &client_config.ws_url,
        client_config.channel.clone(),
        ctx.session.clone(),
    );
    ui::print_step(&format!("Connecting to {}...", channel.url()));
    channel.connect();
    if let Err(e) = channel.wait_connected(CONNECT_TIMEOUT).await {
        channel.disconnect();
        return Err(e).context("Realtime channel did not connect");
    }

    let chat = ChatSession::new(ctx.api.clone(), channel.clone());
    let result = converse(&chat, room).await;

    chat.leave().await;
    channel.disconnect();
    result
}

async fn converse(chat: &ChatSession<ApiClient, Channel>, room: ChatRoom) -> Result<()> {
    let mut inbound = chat.subscribe_messages();
    chat.select_room(room.clone()).await?;

    ui::print_section(&format!("#{} {}", room.id, room.name));
    for message in chat.messages() {
        print_message(&message);
    }
    ui::print_info("Type a message and press Enter. Ctrl-D or Ctrl-C leaves the room.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut states = chat.channel().watch_state();

    loop {
        tokio::select! {
            received = inbound.recv() => match received {
                Ok(message) => print_message(&message),
                Err(RecvError::Lagged(skipped)) => {
                    ui::print_warning(&format!("{} messages skipped", skipped));
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => match line? {
                Some(text) => match chat.send_message(&text) {
                    Ok(()) | Err(ChatError::BlankMessage) => {}
                    Err(e) => ui::print_warning(&e.to_string()),
                },
                None => break,
            },
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let connected = states.borrow_and_update().is_connected();
                ui::print_info(&ui::connection_indicator(connected));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn print_message(message: &ChatMessage) {
    let time = message.sent_at.as_deref().unwrap_or("");
    let sender = if message.sender.is_empty() {
        "?"
    } else {
        message.sender.as_str()
    };
    println!("{} {}: {}", time.dimmed(), sender.cyan().bold(), message.content);
}

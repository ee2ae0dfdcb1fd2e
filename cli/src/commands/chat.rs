use anyhow::Result;

use carelog_core::models::MessageKind;
use carelog_core::service::CareService;

use super::helpers::{format_at, print_json};
use super::{confirm_clear, require_user};

pub(crate) fn cmd_chat_send(
    service: &mut CareService,
    content: &str,
    image: bool,
    json: bool,
) -> Result<()> {
    require_user(service)?;
    let kind = if image {
        MessageKind::Image
    } else {
        MessageKind::Text
    };
    let message = service.send_message(kind, content)?;
    if json {
        print_json(&message)?;
    } else {
        println!("Sent ({} messages in log)", service.chat().len());
    }
    Ok(())
}

pub(crate) fn cmd_chat_log(service: &CareService, limit: Option<usize>, json: bool) -> Result<()> {
    require_user(service)?;
    let messages = service.chat().items();
    let skip = limit.map_or(0, |n| messages.len().saturating_sub(n));
    let shown = &messages[skip..];

    if json {
        return print_json(shown);
    }
    if shown.is_empty() {
        eprintln!("No messages yet. Use `carelog chat send` to write one.");
        return Ok(());
    }
    for message in shown {
        let when = format_at(&message.timestamp);
        match message.kind {
            MessageKind::Text => println!("[{when}] {}", message.content),
            MessageKind::Image => println!("[{when}] <image> {}", message.content),
        }
    }
    Ok(())
}

pub(crate) fn cmd_chat_clear(service: &mut CareService, yes: bool, json: bool) -> Result<()> {
    require_user(service)?;
    if !confirm_clear("messages", yes)? {
        return Ok(());
    }
    let count = service.chat().len();
    service.chat_mut().clear()?;
    if json {
        println!("{}", serde_json::json!({ "cleared": count }));
    } else {
        println!("Cleared {count} messages");
    }
    Ok(())
}

use std::sync::Arc;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::Value;

use crate::api::{AppState, app};
use crate::chat::{ChatController, Message, RenderKind, Role};
use crate::core::AppConfig;
use crate::ucp::UcpClient;

/// Run the interactive shopping session. The proxy relay is spawned
/// in-process so a single command gives a working setup.
pub async fn run() -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    let config = AppConfig::default();
    let ucp = Arc::new(UcpClient::new(&config.proxy_api_url()));

    let state = Arc::new(AppState::new(Arc::clone(&ucp), config.clone()));
    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        config.proxy_host, config.proxy_port
    ))
    .await?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app(state)).await {
            tracing::error!("Proxy server exited: {}", err);
        }
    });

    let mut controller = ChatController::new(Arc::clone(&ucp), config);

    // The greeting is already in the transcript
    let mut printed = 0;
    printed += render_new_messages(controller.transcript(), printed);

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                if line.trim() == ":inspect" {
                    render_logs(&ucp);
                    continue;
                }
                controller.handle_input(&line).await?;
                printed += render_new_messages(controller.transcript(), printed);
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Print transcript entries added since the last turn. The user's own
/// input is skipped since the readline already shows it.
fn render_new_messages(transcript: &[Message], printed: usize) -> usize {
    let fresh = &transcript[printed..];
    for msg in fresh {
        if msg.role == Role::User {
            continue;
        }
        match msg.render {
            RenderKind::Plain => println!("{}", msg.content),
            RenderKind::ProductList => render_product_list(msg),
            RenderKind::CheckoutSummary => render_checkout_summary(msg),
        }
    }
    fresh.len()
}

fn render_product_list(msg: &Message) {
    println!("{}", msg.content);
    let Some(payload) = &msg.payload else { return };

    let products = payload
        .get("products")
        .or_else(|| payload.get("items"))
        .and_then(|v| v.as_array());
    match products {
        Some(products) => {
            for product in products {
                let name = product
                    .get("name")
                    .or_else(|| product.get("title"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("(unnamed)");
                match product.get("price") {
                    Some(price) => println!("  - {} ({})", name, price),
                    None => println!("  - {}", name),
                }
            }
        }
        None => println!("{:#}", payload),
    }
}

fn render_checkout_summary(msg: &Message) {
    println!("{}", msg.content);
    let Some(payload) = &msg.payload else { return };

    if let Some(status) = payload.get("status").and_then(Value::as_str) {
        println!("  status: {}", status);
    }
    if let Some(items) = payload.get("line_items").and_then(Value::as_array) {
        println!("  items: {}", items.len());
    }
    if let Some(total) = payload
        .get("totals")
        .and_then(|t| t.get("total"))
        .or_else(|| payload.get("total"))
    {
        println!("  total: {}", total);
    }
}

/// Dump the commerce client's request log, newest first
fn render_logs(ucp: &UcpClient) {
    let logs = ucp.logs();
    if logs.is_empty() {
        println!("No requests logged yet.");
        return;
    }
    for entry in logs {
        let status = entry
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| String::from("-"));
        println!("[{}] {} {} -> {}", entry.timestamp, entry.method, entry.url, status);
    }
}

/**
 * chatsync Terminal Client - Main Entry Point
 *
 * Line-oriented view over the sync coordinator: renders the chat list and
 * the selected thread, and turns typed commands into intents.
 */
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use chatsync::client::sync::{push, SendOutcome};
use chatsync::client::{Config, IdentityProvider, SyncCoordinator, SyncError, SyncNotice};
use chatsync::shared::messaging::{
    default_avatar, Conversation, ConversationId, ConversationMeta, MessageStatus,
};

const HELP: &str = "commands: /list  /select <id>  /new <name> [number]  /delivered  /read  /back  /quit\n\
                    anything else is sent to the selected chat";

/// The chats shown before any server interaction
fn demo_conversations() -> Vec<ConversationMeta> {
    [
        ("929967673820", "dedew", "Last seen 03:57"),
        ("919937320320", "Ravi", "Last seen 2 hours ago"),
    ]
    .into_iter()
    .map(|(id, name, last_seen)| {
        let id = ConversationId::from(id);
        ConversationMeta::new(id.clone())
            .with_display_name(name)
            .with_avatar(default_avatar(&id))
            .with_last_seen(last_seen)
    })
    .collect()
}

/// Intents parsed from one input line
#[derive(Debug, PartialEq, Eq)]
enum Command {
    List,
    Select(ConversationId),
    New { name: String, number: String },
    Mark(MessageStatus),
    Back,
    Quit,
    Help,
    Send(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };
    let mut parts = rest.split_whitespace();
    match parts.next().unwrap_or_default() {
        "list" => Command::List,
        "select" => match parts.next() {
            Some(id) => Command::Select(ConversationId::from(id)),
            None => Command::Help,
        },
        "new" => {
            let mut words: Vec<&str> = parts.collect();
            let number = match words.last() {
                Some(last) if is_phone_number(last) => {
                    let number = last.to_string();
                    words.pop();
                    number
                }
                _ => String::new(),
            };
            Command::New {
                name: words.join(" "),
                number,
            }
        }
        "delivered" => Command::Mark(MessageStatus::Delivered),
        "read" => Command::Mark(MessageStatus::Read),
        "back" => Command::Back,
        "quit" | "exit" => Command::Quit,
        _ => Command::Help,
    }
}

fn is_phone_number(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_digit())
        && word.chars().all(|c| c.is_ascii_digit() || "+-()".contains(c))
}

fn status_mark(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Sent => "✓",
        MessageStatus::Delivered => "✓✓",
        MessageStatus::Read => "✓✓ read",
    }
}

fn render_list(conversations: &[Conversation], selected: Option<&ConversationId>) {
    println!("── chats ──");
    for conversation in conversations {
        let marker = if Some(&conversation.id) == selected { ">" } else { " " };
        println!(
            "{} {:<14} {:<16} {:>5}  {}",
            marker,
            conversation.id,
            conversation.display_name,
            conversation.last_activity_time,
            conversation.last_message_preview
        );
    }
}

fn render_thread(conversation: &Conversation) {
    println!("── {} ({}) ──", conversation.display_name, conversation.last_seen_text);
    for message in &conversation.messages {
        if message.from_self {
            println!(
                "{:>5}  you: {}  {}",
                message.display_time,
                message.text,
                status_mark(message.status)
            );
        } else {
            println!("{:>5}  {}", message.display_time, message.text);
        }
    }
}

async fn handle(sync: &SyncCoordinator, command: Command) -> Result<bool, SyncError> {
    match command {
        Command::List => {
            let selected = sync.selected().await;
            render_list(&sync.snapshot().await, selected.as_ref());
        }
        Command::Select(id) => {
            sync.select_conversation(&id).await?;
        }
        Command::New { name, number } => {
            let id = sync.start_new_conversation(&name, &number).await?;
            println!("started chat {}", id);
        }
        Command::Mark(status) => {
            let selected = sync.selected().await.ok_or(SyncError::NoConversationSelected)?;
            let backend_id = sync.mark_last_own(&selected, status).await?;
            println!("marked {} as {}", backend_id, status);
        }
        Command::Back => sync.clear_selection().await,
        Command::Quit => return Ok(false),
        Command::Help => println!("{}", HELP),
        Command::Send(text) => {
            let selected = sync.selected().await.ok_or(SyncError::NoConversationSelected)?;
            if let SendOutcome::Unacknowledged = sync.send_text(&selected, &text).await? {
                println!("sent, waiting for the server to confirm");
            }
        }
    }
    Ok(true)
}

async fn on_notice(sync: &SyncCoordinator, notice: SyncNotice) {
    match notice {
        SyncNotice::ConversationChanged(id) => {
            if sync.selected().await.as_ref() == Some(&id) {
                if let Some(conversation) = sync.conversation(&id).await {
                    render_thread(&conversation);
                }
            }
        }
        SyncNotice::SelectionChanged(None) => {
            let snapshot = sync.snapshot().await;
            render_list(&snapshot, None);
        }
        SyncNotice::SelectionChanged(Some(_)) => {}
        SyncNotice::NetworkError { operation, message } => {
            eprintln!("! {} failed: {}", operation, message);
        }
        SyncNotice::PushStatus(status) => {
            tracing::info!("[PUSH] {:?}", status);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load()?;
    let identity = match config.session_file() {
        Some(path) => IdentityProvider::session_file(path),
        None => IdentityProvider::ephemeral(),
    };
    let sync = SyncCoordinator::connect(&config, &identity, demo_conversations())?;
    let mut notices = sync.subscribe_notices();

    let (deliveries, _push_task) = push::spawn_sse_subscription(&config)?;
    let _pump = sync.attach_push(deliveries)?;

    println!("{}", HELP);
    render_list(&sync.snapshot().await, None);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match handle(&sync, parse_command(&line)).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    // Network failures are also reported as notices
                    Err(e) if e.is_transient() => {}
                    Err(e) => eprintln!("! {}", e),
                }
            }
            notice = notices.recv() => match notice {
                Ok(notice) => on_notice(&sync, notice).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("[SYNC] Skipped {} notices", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("[SYNC] Shutting down");
    Ok(())
}

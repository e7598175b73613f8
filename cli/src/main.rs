use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use noughts::chat::{ChatPollingController, ChatSession};
use noughts::config::{ClientConfig, ConfigError};
use noughts::game::controller::{ControllerError, MoveDisposition};
use noughts::game::{GamePollingController, GameSession};
use noughts::net::api::HttpAuthority;
use noughts::net::error::ApiError;
use noughts::net::types::{Mark, PairError, PlayerPair, Position};
use noughts::state::game_view::{GameView, ViewState};
use noughts::state::session::{SessionContext, SessionError};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

const REDRAW_EVERY: Duration = Duration::from_millis(100);
const GAME_HELP: &str = "1-9 move, r restart, q quit";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing session; pass --token and --user-id or set NOUGHTS_TOKEN and NOUGHTS_USER_ID")]
    MissingSession,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("invalid session: {0}")]
    Session(#[from] SessionError),
    #[error("invalid player pair: {0}")]
    Pair(#[from] PairError),
    #[error("stdin read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "noughts", about = "Noughts and crosses polling client")]
struct Cli {
    #[arg(long, env = "NOUGHTS_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "NOUGHTS_TOKEN")]
    token: Option<String>,

    #[arg(long, env = "NOUGHTS_USER_ID")]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

struct CliContext {
    config: ClientConfig,
    token: Option<String>,
    user_id: Option<String>,
}

impl CliContext {
    fn session(&self) -> Result<SessionContext, CliError> {
        let (Some(token), Some(user_id)) = (&self.token, &self.user_id) else {
            return Err(CliError::MissingSession);
        };
        Ok(SessionContext::new(token, user_id)?)
    }

    fn authority(&self) -> Result<HttpAuthority, CliError> {
        Ok(HttpAuthority::new(&self.config)?)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange email and password for a bearer token.
    Login(CredentialArgs),
    /// Create an account.
    Register(CredentialArgs),
    Contacts(ContactsCommand),
    /// Tail a chat; each stdin line is sent as a message.
    Chat { chat_id: String },
    /// Play against `opponent_id`; stdin 1-9 moves, r restarts, q quits.
    Game(GameArgs),
}

#[derive(Args, Debug)]
struct CredentialArgs {
    #[arg(long)]
    email: String,

    #[arg(long, env = "NOUGHTS_PASSWORD")]
    password: String,
}

#[derive(Args, Debug)]
struct ContactsCommand {
    #[command(subcommand)]
    command: ContactsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ContactsSubcommand {
    List,
    Add { email: String },
}

#[derive(Args, Debug)]
struct GameArgs {
    opponent_id: String,

    #[arg(long, default_value_t = false, help = "Join as player 2 of the pair")]
    second: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    // Logs go to stderr so they never interleave with the board on stdout.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url)?;
    }
    let ctx = CliContext {
        config,
        token: cli.token,
        user_id: cli.user_id,
    };

    match cli.command {
        Command::Login(args) => run_login(&ctx, args).await,
        Command::Register(args) => run_register(&ctx, args).await,
        Command::Contacts(contacts) => run_contacts(&ctx, contacts).await,
        Command::Chat { chat_id } => run_chat(&ctx, chat_id).await,
        Command::Game(args) => run_game(&ctx, args).await,
    }
}

async fn run_login(ctx: &CliContext, args: CredentialArgs) -> Result<(), CliError> {
    let response = ctx.authority()?.authenticate(&args.email, &args.password).await?;
    print_json(&response)
}

async fn run_register(ctx: &CliContext, args: CredentialArgs) -> Result<(), CliError> {
    let user = ctx.authority()?.register(&args.email, &args.password).await?;
    print_json(&user)
}

async fn run_contacts(ctx: &CliContext, contacts: ContactsCommand) -> Result<(), CliError> {
    let session = ctx.session()?;
    let authority = ctx.authority()?;
    match contacts.command {
        ContactsSubcommand::List => {
            let list = authority.list_contacts(&session).await?;
            print_json(&list)
        }
        ContactsSubcommand::Add { email } => {
            let response = authority.add_contact(&session, &email).await?;
            print_json(&response)
        }
    }
}

// =============================================================================
// CHAT
// =============================================================================

async fn run_chat(ctx: &CliContext, chat_id: String) -> Result<(), CliError> {
    let session = ctx.session()?;
    let authority = Arc::new(ctx.authority()?);
    let controller = ChatPollingController::new(authority, session, chat_id);
    let chat = ChatSession::mount(controller.clone(), ctx.config.chat_poll_interval);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut redraw = tokio::time::interval(REDRAW_EVERY);
    let mut shown = 0;
    let mut printed = HashSet::new();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                // Failures are already logged; the prompt stays open.
                let _ = controller.send(&line).await;
            }
            _ = redraw.tick() => {
                let seq = controller.applied_seq();
                if seq != shown {
                    shown = seq;
                    for message in controller.messages() {
                        if printed.insert(message.id.clone()) {
                            let who = if controller.is_mine(&message) { "me" } else { "them" };
                            println!("[{}] {who}: {}", message.sent_at, message.content);
                        }
                    }
                }
            }
        }
    }

    chat.unmount();
    Ok(())
}

// =============================================================================
// GAME
// =============================================================================

#[derive(Debug, PartialEq, Eq)]
enum GameInput {
    Move(Position),
    Restart,
    Quit,
    Unknown,
}

fn parse_game_input(line: &str) -> GameInput {
    match line.trim() {
        "q" | "quit" => GameInput::Quit,
        "r" | "restart" => GameInput::Restart,
        other => other
            .parse::<u8>()
            .ok()
            .and_then(Position::new)
            .map_or(GameInput::Unknown, GameInput::Move),
    }
}

async fn run_game(ctx: &CliContext, args: GameArgs) -> Result<(), CliError> {
    let session = ctx.session()?;
    let me = session.user_id().to_owned();
    let pair = if args.second {
        PlayerPair::new(args.opponent_id, me)?
    } else {
        PlayerPair::new(me, args.opponent_id)?
    };
    let authority = Arc::new(ctx.authority()?);
    let (controller, mut notifications) = GamePollingController::new(authority, session, pair);
    let game = GameSession::mount(controller.clone(), ctx.config.game_poll_interval);

    println!("{GAME_HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut redraw = tokio::time::interval(REDRAW_EVERY);
    let mut shown = 0;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_game_input(&line) {
                    GameInput::Quit => break,
                    GameInput::Restart => match controller.restart().await {
                        Err(ControllerError::NotLoaded) => println!("game not loaded yet"),
                        // Other failures arrive as a notification.
                        Ok(()) | Err(_) => {}
                    },
                    GameInput::Move(position) => {
                        if let MoveDisposition::Ignored(reason) = controller.attempt_move(position).await {
                            tracing::debug!(?reason, %position, "input ignored");
                        }
                    }
                    GameInput::Unknown => println!("{GAME_HELP}"),
                }
            }
            Some(notification) = notifications.recv() => println!("{notification}"),
            _ = redraw.tick() => {
                let seq = controller.applied_seq();
                if seq != shown {
                    shown = seq;
                    println!("{}", render_view(&controller.view()));
                }
            }
        }
    }

    game.unmount();
    Ok(())
}

fn render_view(view: &ViewState) -> String {
    match view {
        ViewState::Loading => "Loading game...".to_owned(),
        ViewState::Ready(view) => render_board(view),
    }
}

fn render_board(view: &GameView) -> String {
    let mut out = String::new();
    if let Some(symbol) = view.local_symbol {
        let _ = writeln!(out, "You are {}", symbol.mark());
    }
    for (i, row) in view.rows().enumerate() {
        if i > 0 {
            out.push_str("---+---+---\n");
        }
        let cells: Vec<String> = row
            .iter()
            .map(|cell| match cell.mark {
                Mark::Empty => format!(" {} ", cell.position),
                mark => format!(" {mark} "),
            })
            .collect();
        out.push_str(&cells.join("|"));
        out.push('\n');
    }
    let _ = write!(out, "{}", view.banner);
    if view.restart_visible {
        out.push_str("  (r to restart)");
    }
    out
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

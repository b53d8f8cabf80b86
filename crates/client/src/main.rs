//! dreamecho: command-line client for the DreamEcho API.
//!
//! Использование:
//!   dreamecho login --email me@example.com --password secret
//!   dreamecho create --title "Flying whale" --description "..." --style surreal --mood calm
//!   dreamecho list

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use client::domain::a001_dream::GenerationOutcome;
use client::shared::{config, logger};
use client::system::auth::storage::FileTokenStore;
use client::AppState;
use contracts::domain::a001_dream::{BlockchainOption, Dream, DreamCreationRequest, DreamId};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "dreamecho")]
#[command(about = "Turn dream descriptions into 3D models")]
struct Cli {
    /// Путь к конфигу (по умолчанию ./dreamecho.toml)
    #[arg(long, global = true, env = "DREAMECHO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Войти и сохранить токен
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Создать аккаунт
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// Показать текущего пользователя
    Whoami,
    /// Список снов: pending и завершённые
    List,
    /// Статус одного сна
    Status { id: String },
    /// Отправить сон и следить за генерацией (Ctrl-C прерывает)
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        style: String,
        #[arg(long)]
        mood: String,
        #[arg(long, default_value = "ethereum")]
        blockchain: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init("warn,client=info");

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    let token_path = config.token_path();
    let tokens = Arc::new(FileTokenStore::new(token_path));
    let mut app = AppState::new(&config.api, tokens)?;

    match cli.command {
        Command::Login { email, password } => {
            let session = app.login(&email, &password).await?;
            println!("Logged in as {} <{}>", session.user.username, session.user.email);
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let session = app.register(&username, &email, &password).await?;
            println!("Registered {} <{}>", session.user.username, session.user.email);
        }
        Command::Logout => {
            app.logout().await?;
            println!("Logged out");
        }
        Command::Whoami => {
            require_session(&mut app).await?;
            if let Some(user) = app.auth.user() {
                println!("{} <{}> ({})", user.username, user.email, user.id);
            }
        }
        Command::List => {
            require_session(&mut app).await?;
            let store = app.dreams.store();
            println!("Pending ({}):", store.pending().len());
            for dream in store.pending() {
                print_dream(dream);
            }
            println!("Completed ({}):", store.completed().len());
            for dream in store.completed() {
                print_dream(dream);
            }
        }
        Command::Status { id } => {
            require_session(&mut app).await?;
            let id = parse_id(&id)?;
            let dream = app.dreams.refresh_dream(id).await?;
            print_dream(&dream);
        }
        Command::Create {
            title,
            description,
            style,
            mood,
            blockchain,
            tags,
        } => {
            require_session(&mut app).await?;
            let blockchain = BlockchainOption::from_str(&blockchain).map_err(anyhow::Error::msg)?;
            let request = DreamCreationRequest {
                title,
                description,
                style,
                mood,
                blockchain,
                tags,
            };
            let dream = app.dreams.submit_dream(&request).await?;
            println!("Submitted dream {} ({})", dream.id, dream.status);

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            let outcome = app
                .dreams
                .follow_generation(dream.id, cancel, |event| {
                    println!(
                        "  [{:>3.0}%] {}",
                        event.clamped_progress() * 100.0,
                        event.display_message()
                    );
                })
                .await?;

            match outcome {
                GenerationOutcome::Finished(dream) => print_dream(&dream),
                GenerationOutcome::Cancelled => {
                    println!("Stopped following {}; generation continues on the server", dream.id)
                }
            }
        }
    }

    Ok(())
}

/// Restore the stored session or fail with a hint to log in
async fn require_session(app: &mut AppState) -> anyhow::Result<()> {
    if !app.bootstrap().await? {
        anyhow::bail!("Not logged in. Run `dreamecho login` first");
    }
    Ok(())
}

fn parse_id(raw: &str) -> anyhow::Result<DreamId> {
    let uuid: uuid::Uuid = raw
        .parse()
        .with_context(|| format!("Invalid dream id: {}", raw))?;
    Ok(DreamId::new(uuid))
}

fn print_dream(dream: &Dream) {
    println!(
        "  {}  {:<10}  {}  [{}]",
        dream.id,
        dream.status.as_str(),
        dream.title,
        dream.blockchain.display_name()
    );
    if let Some(url) = &dream.usd_model_url {
        println!("      model: {}", url);
    }
}

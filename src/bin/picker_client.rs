use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use picker_proxy::client::{
    CallbackOutcome, ClientController, FileSessionIdStore, HttpBackendApi, Launcher, PrintUrl,
    SystemBrowser,
};
use picker_proxy::models::Platform;
use picker_proxy::proxy::ListDriveFilesRequest;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "picker-client")]
#[command(about = "Sign in with Google and pick Photos or Drive files through a picker proxy")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Picker proxy base URL
    #[arg(
        short,
        long,
        global = true,
        env = "PICKER_BACKEND_URL",
        default_value = "http://localhost:3000"
    )]
    backend: String,

    /// File holding the session id (defaults to the user config dir)
    #[arg(long, global = true, env = "PICKER_SESSION_FILE")]
    session_file: Option<PathBuf>,

    /// Platform reported to the backend; selects the callback redirect target
    #[arg(long, global = true, default_value = "web")]
    platform: Platform,

    /// Print URLs instead of opening a browser
    #[arg(long, global = true)]
    no_browser: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and wait until the backend confirms the session
    SignIn,
    /// Complete sign-in from a callback URL or deep link
    Callback {
        /// e.g. mediapicker://oauth-callback?sessionId=...&success=true
        url: String,
    },
    /// Show whether the stored session is still valid
    Status,
    /// Open the Google Photos picker and print the picked items
    Photos,
    /// List Google Drive files
    Drive {
        #[arg(long)]
        page_size: Option<u32>,
        #[arg(long)]
        page_token: Option<String>,
        /// Drive search expression
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Forget the stored session
    SignOut,
}

type Controller = ClientController<HttpBackendApi, FileSessionIdStore, Box<dyn Launcher>>;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let controller = build_controller(&cli)?;

    match cli.command {
        Commands::SignIn => {
            let session_id = controller.sign_in().await.context("signing in")?;
            println!("Signed in (session {session_id})");
        }
        Commands::Callback { url } => {
            match CallbackOutcome::from_url(&url).context("parsing callback")? {
                CallbackOutcome::Success { session_id } => {
                    if controller
                        .adopt_session(&session_id)
                        .await
                        .context("handling callback")?
                    {
                        println!("Signed in (session {session_id})");
                    } else {
                        anyhow::bail!("backend does not recognise session {session_id}");
                    }
                }
                CallbackOutcome::Failure { error } => {
                    anyhow::bail!("sign-in failed: {error}");
                }
            }
        }
        Commands::Status => {
            if controller.restore().await.context("verifying session")? {
                println!("Signed in");
            } else {
                println!("Signed out");
            }
        }
        Commands::Photos => {
            ensure_signed_in(&controller).await?;
            let items = controller.pick_media().await.context("picking media")?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        Commands::Drive {
            page_size,
            page_token,
            query,
        } => {
            ensure_signed_in(&controller).await?;
            let files = controller
                .list_drive_files(&ListDriveFilesRequest {
                    page_size,
                    page_token,
                    query,
                })
                .await
                .context("listing Drive files")?;
            println!("{}", serde_json::to_string_pretty(&files)?);
        }
        Commands::SignOut => {
            controller.sign_out().context("signing out")?;
            println!("Signed out");
        }
    }

    Ok(())
}

fn build_controller(cli: &Cli) -> Result<Controller> {
    let api = HttpBackendApi::new(&cli.backend).context("creating HTTP client")?;
    let store = match &cli.session_file {
        Some(path) => FileSessionIdStore::with_path(path),
        None => FileSessionIdStore::new().context("locating session file")?,
    };
    let launcher: Box<dyn Launcher> = if cli.no_browser {
        Box::new(PrintUrl)
    } else {
        Box::new(SystemBrowser)
    };

    Ok(ClientController::new(api, store, launcher, cli.platform))
}

async fn ensure_signed_in(controller: &Controller) -> Result<()> {
    if !controller.restore().await.context("verifying session")? {
        anyhow::bail!("not signed in; run `picker-client sign-in` first");
    }
    Ok(())
}

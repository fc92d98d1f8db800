use clap::{Parser, Subcommand};
use lib::auth::{AuthClient, TokenStore};
use lib::backend::{index_display_name, BackendClient};
use lib::controller::{ConversationController, Severity};
use lib::health::{spawn_health_monitor, HEALTH_CHECK_PERIOD};
use lib::simulate::FallbackResponder;
use lib::transcript::Role;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docbot")]
#[command(about = "DocBot CLI — chat with your documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create an account. Does not log you in; run `docbot login` after.
    Signup {
        /// Config file path (default: DOCBOT_CONFIG_PATH or ~/.docbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        #[arg(long)]
        username: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },

    /// Log in and store the session token.
    Login {
        /// Config file path (default: DOCBOT_CONFIG_PATH or ~/.docbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },

    /// Delete the stored session token.
    Logout {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Show the currently logged-in user.
    Whoami {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Check whether the backend is reachable and healthy.
    Health {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Upload a PDF and index it for chat.
    Upload {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Path to the PDF file (max 10MB).
        file: PathBuf,
    },

    /// List available document indexes (requires login).
    Indexes {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Switch chat to another document index (requires login).
    Switch {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Index identifier, e.g. from `docbot indexes`.
        index: String,
    },

    /// Interactive chat with the active document index.
    Chat {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("docbot {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Signup {
            config,
            username,
            email,
            password,
        }) => run_signup(config, &username, &email, &password).await,
        Some(Commands::Login {
            config,
            email,
            password,
        }) => run_login(config, &email, &password).await,
        Some(Commands::Logout { config }) => run_logout(config),
        Some(Commands::Whoami { config }) => run_whoami(config).await,
        Some(Commands::Health { config }) => run_health(config).await,
        Some(Commands::Upload { config, file }) => run_upload(config, &file).await,
        Some(Commands::Indexes { config }) => run_indexes(config).await,
        Some(Commands::Switch { config, index }) => run_switch(config, &index).await,
        Some(Commands::Chat { config }) => run_chat(config).await,
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn make_clients(config_path: Option<PathBuf>) -> anyhow::Result<(AuthClient, BackendClient)> {
    let (config, _) = lib::config::load_config(config_path)?;
    let api_url = lib::config::resolve_api_url(&config);
    let auth = AuthClient::new(&api_url, TokenStore::default_store());
    let backend = BackendClient::new(&api_url);
    Ok((auth, backend))
}

async fn run_signup(
    config: Option<PathBuf>,
    username: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let (auth, _) = make_clients(config)?;
    let user = auth.signup(username, email, password).await?;
    println!(
        "Account created for {} ({}). Run `docbot login` to sign in.",
        user.username, user.email
    );
    Ok(())
}

async fn run_login(config: Option<PathBuf>, email: &str, password: &str) -> anyhow::Result<()> {
    let (auth, _) = make_clients(config)?;
    let session = auth.login(email, password).await?;
    match session.username() {
        Some(name) => println!("Welcome back, {}!", name),
        None => println!("Logged in."),
    }
    Ok(())
}

fn run_logout(config: Option<PathBuf>) -> anyhow::Result<()> {
    let (auth, _) = make_clients(config)?;
    auth.logout();
    println!("Logged out successfully");
    Ok(())
}

async fn run_whoami(config: Option<PathBuf>) -> anyhow::Result<()> {
    let (auth, _) = make_clients(config)?;
    let session = auth.restore_session().await;
    match session.user {
        Some(user) => println!("{} <{}> (id {})", user.username, user.email, user.id),
        None => println!("Not logged in."),
    }
    Ok(())
}

async fn run_health(config: Option<PathBuf>) -> anyhow::Result<()> {
    let (_, backend) = make_clients(config)?;
    if backend.check_health().await {
        println!("backend healthy at {}", backend.base_url());
    } else {
        println!("backend unreachable or unhealthy at {}", backend.base_url());
    }
    Ok(())
}

async fn run_upload(config: Option<PathBuf>, file: &PathBuf) -> anyhow::Result<()> {
    let (_, backend) = make_clients(config)?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid file name: {}", file.display()))?
        .to_string();
    let bytes = std::fs::read(file)
        .map_err(|e| anyhow::anyhow!("reading {}: {}", file.display(), e))?;
    let result = backend.upload_document(&filename, bytes).await?;
    println!(
        "Successfully uploaded {}! Created {} text chunks.",
        result.filename, result.text_chunks
    );
    println!("New index: {}", result.index_name);
    Ok(())
}

async fn run_indexes(config: Option<PathBuf>) -> anyhow::Result<()> {
    let (auth, backend) = make_clients(config)?;
    let credential = auth.credential();
    let indexes = backend.list_indexes(credential.as_ref()).await?;
    if indexes.is_empty() {
        println!("No documents available");
        return Ok(());
    }
    for index in indexes {
        println!("{}  [{}]", index_display_name(&index), index);
    }
    Ok(())
}

async fn run_switch(config: Option<PathBuf>, index: &str) -> anyhow::Result<()> {
    let (auth, backend) = make_clients(config)?;
    let credential = auth.credential();
    backend.switch_index(credential.as_ref(), index).await?;
    println!("Switched to document: {}", index);
    Ok(())
}

async fn run_chat(config: Option<PathBuf>) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (auth, backend) = make_clients(config)?;
    let session = auth.restore_session().await;
    match session.username() {
        Some(name) => println!("Welcome back, {}!", name),
        None => println!("Not logged in; /switch and /indexes will be unavailable."),
    }

    let (mut health_rx, _health_task) =
        spawn_health_monitor(backend.clone(), HEALTH_CHECK_PERIOD);
    // Wait briefly for the first probe so the offline hint is not shown
    // spuriously before the backend has been checked at all.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), health_rx.changed()).await;

    let gateway = backend.clone();
    let mut controller =
        ConversationController::new(backend.clone(), FallbackResponder::new(backend));
    print_message(controller.transcript().last());
    println!("Commands: /clear /indexes /switch <id> /upload <path> /exit");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut was_offline = false;

    loop {
        let offline = !*health_rx.borrow();
        if offline != was_offline {
            if offline {
                println!("(backend offline — replies will be simulated)");
            } else {
                println!("(backend reachable)");
            }
            was_offline = offline;
        }

        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        if input.eq_ignore_ascii_case("/clear") {
            controller.clear_transcript();
            print_message(controller.transcript().last());
            continue;
        }
        if input.eq_ignore_ascii_case("/indexes") {
            let credential = auth.credential();
            match gateway.list_indexes(credential.as_ref()).await {
                Ok(indexes) => {
                    for index in indexes {
                        let marker = if index == controller.active_index() {
                            "*"
                        } else {
                            " "
                        };
                        println!("{} {}  [{}]", marker, index_display_name(&index), index);
                    }
                }
                Err(e) => eprintln!("indexes error: {}", e),
            }
            continue;
        }
        if let Some(index) = input.strip_prefix("/switch ") {
            let credential = auth.credential();
            match controller
                .switch_active_index(credential.as_ref(), index.trim())
                .await
            {
                Ok(()) => {}
                Err(e) => eprintln!("switch error: {}", e),
            }
            print_notification(&controller);
            continue;
        }
        if let Some(path) = input.strip_prefix("/upload ") {
            let path = PathBuf::from(path.trim());
            match std::fs::read(&path) {
                Ok(bytes) => {
                    let filename = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("upload.pdf")
                        .to_string();
                    let _ = controller.upload_document(&filename, bytes).await;
                    print_notification(&controller);
                    println!("Active index: {}", controller.active_index());
                }
                Err(e) => eprintln!("reading {}: {}", path.display(), e),
            }
            continue;
        }

        if controller.send_message(input).await {
            print_message(controller.transcript().last());
        }
    }

    Ok(())
}

fn print_message(message: &lib::transcript::Message) {
    let prefix = match message.role {
        Role::User => ">",
        Role::Assistant => "<",
    };
    println!("{} {}", prefix, message.content.trim());
    if !message.sources.is_empty() {
        println!("  sources:");
        for source in &message.sources {
            println!("    - {}", source.label());
        }
    }
}

fn print_notification<R: lib::backend::ChatResponder>(controller: &ConversationController<R>) {
    if let Some(n) = controller.notification() {
        let tag = match n.severity {
            Severity::Info => "info",
            Severity::Success => "ok",
            Severity::Error => "error",
        };
        println!("[{}] {}", tag, n.message);
    }
}

use clap::{Parser, Subcommand};
use gait::ChatApp;
use gait_core::{telemetry, ClientConfig, GaitClient, Registration};
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gait", version, about = "Ask the GAIT backend questions from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "GAIT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account. Log in afterwards.
    Register {
        #[arg(long)]
        fullname: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "GAIT_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        age: Option<u32>,
    },
    /// Forget the stored session.
    Logout,
    /// Show whether a session is active.
    Status,
    /// Ask a single question.
    Ask {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// List past questions.
    History,
    /// Interactive session.
    Chat,
}

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing(EnvFilter::from_default_env())?;

    let cli = Cli::parse();
    let config = match ClientConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err.user_message());
            return Ok(ExitCode::from(2));
        }
    };

    let runtime = Arc::new(Runtime::new()?);
    let client = GaitClient::from_config(&config)?;
    let app = ChatApp::new(client, runtime);
    let mut out = io::stdout().lock();

    let succeeded = match cli.command {
        Command::Login { email, password } => app.login(&email, &password, &mut out)?,
        Command::Register {
            fullname,
            email,
            password,
            age,
        } => {
            let mut registration = Registration::new(fullname, email, password);
            registration.age = age;
            app.register(&registration, &mut out)?
        }
        Command::Logout => {
            app.logout(&mut out)?;
            true
        }
        Command::Status => {
            app.status(&mut out)?;
            true
        }
        Command::Ask { prompt } => app.ask(&prompt.join(" "), &mut out)?,
        Command::History => app.history(&mut out)?,
        Command::Chat => {
            app.run_chat(io::stdin().lock(), &mut out)?;
            true
        }
    };
    out.flush()?;

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

use clap::{Parser, Subcommand};
use seed::Task;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Operator account, must be on the `users` allow-list.
    #[arg(long, env = "GAROON_ADMIN_EMAIL")]
    email: String,

    #[arg(long, env = "GAROON_ADMIN_PASSWORD", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    task: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Insert the default restaurants that are missing.
    Restaurants,
    /// Create the contact details singleton if it does not exist.
    Contact,
    /// Print record counts.
    Status,
}

impl From<Command> for Task {
    fn from(command: Command) -> Self {
        match command {
            Command::Restaurants => Task::Restaurants,
            Command::Contact => Task::Contact,
            Command::Status => Task::Status,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    for line in seed::run(&args.email, &args.password, args.task.into()).await? {
        println!("{line}");
    }

    Ok(())
}

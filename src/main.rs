//! CLI entry point for `detach`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};

use detach::config::{self, Config, Overrides};
use detach::deliver::SmtpOutbox;
use detach::error::DetachError;
use detach::pipeline;
use detach::prompt::ConsoleOperator;

#[derive(Parser)]
#[command(
    name = "detach",
    version,
    about = "Take the attachments out of held mailing-list posts and forward the rest"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file to use, in addition to system- and user-wide configuration
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to maildir (overrides value obtained from configuration)
    #[arg(short, long, value_name = "DIR")]
    maildir: Option<PathBuf>,

    /// Also look at messages marked as read (overrides configuration)
    #[arg(long)]
    with_read: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Some(Commands::Completions { shell }) => cmd_completions(*shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => cmd_run(&cli),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("detach: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Configuration problems exit with 2, everything else with 1.
fn exit_status(err: &anyhow::Error) -> u8 {
    let is_config = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<DetachError>(),
            Some(DetachError::Config(_))
        )
    });
    if is_config {
        2
    } else {
        1
    }
}

/// Triage the held messages in the configured maildir.
fn cmd_run(cli: &Cli) -> anyhow::Result<()> {
    let overrides = Overrides {
        config: cli.config.clone(),
        maildir: cli.maildir.clone(),
        with_read: cli.with_read,
    };
    let config = config::load_config(&overrides)?;

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let settings = config.settings()?;
    tracing::info!(maildir = %settings.maildir.display(), "looking in mailbox");
    tracing::info!(
        pattern = settings.destination.dir_template(),
        "attachment directory pattern"
    );
    tracing::info!(learn_spam = ?settings.learn_spam, learn_ham = ?settings.learn_ham, "learn commands");

    let mut outbox = SmtpOutbox::open(&settings.smtp, &settings.user)?;
    let mut operator = ConsoleOperator::stdio();
    let summary = pipeline::run(&settings, &mut operator, &mut outbox)?;

    tracing::debug!(?summary, "Done");
    Ok(())
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "detach.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "detach", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_config_error_exits_with_2() {
        let err = Err::<(), _>(DetachError::Config("No option 'user' in section: 'detach'".into()))
            .context("loading settings")
            .unwrap_err();
        assert_eq!(exit_status(&err), 2);
        assert_eq!(exit_status(&anyhow::Error::new(DetachError::Config("x".into()))), 2);
    }

    #[test]
    fn test_other_errors_exit_with_1() {
        let err = anyhow::Error::new(DetachError::Transport("refused".into()))
            .context("sending message");
        assert_eq!(exit_status(&err), 1);
        assert_eq!(exit_status(&anyhow::anyhow!("plain failure")), 1);
    }
}

//! Command-line interface for the shadow lifecycle engine.

pub mod commands;
pub mod envelope;

pub use clap::Parser;

use clap::Subcommand;

#[derive(Parser)]
#[command(name = "shadow")]
#[command(about = "Create and drive disposable shadow development environments")]
#[command(version, author, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new shadow environment from one or more local repositories
    Create(commands::create::CreateArgs),
    /// Add a source to an existing shadow (fails if already present)
    AddSource(commands::source::SourceArgs),
    /// Re-snapshot and re-push a source, adding it if absent
    SyncSource(commands::source::SourceArgs),
    /// Run a command inside a shadow
    Exec(commands::exec::ExecArgs),
    /// Run several commands sequentially inside a shadow
    ExecBatch(commands::exec::ExecBatchArgs),
    /// Attach an interactive shell inside a shadow
    Shell(commands::exec::ShellArgs),
    /// Show files changed since the shadow's baseline
    Diff(commands::diff::DiffArgs),
    /// Copy a path out of a shadow's workspace
    Extract(commands::transfer::ExtractArgs),
    /// Copy a path into a shadow's workspace
    Inject(commands::transfer::InjectArgs),
    /// List known shadow environments
    List,
    /// Show a shadow's status and health
    Status(commands::status::StatusArgs),
    /// Run host or environment preflight checks
    Preflight(commands::status::PreflightArgs),
    /// Build the shadow base image
    BuildImage(commands::image::BuildImageArgs),
    /// Destroy a shadow environment
    Destroy(commands::destroy::DestroyArgs),
    /// Destroy every known shadow environment
    DestroyAll(commands::destroy::DestroyAllArgs),
}

impl Cli {
    pub async fn run(self) -> i32 {
        match self.command {
            Commands::Create(args) => commands::create::run(args).await,
            Commands::AddSource(args) => commands::source::run_add(args).await,
            Commands::SyncSource(args) => commands::source::run_sync(args).await,
            Commands::Exec(args) => commands::exec::run_exec(args).await,
            Commands::ExecBatch(args) => commands::exec::run_exec_batch(args).await,
            Commands::Shell(args) => commands::exec::run_shell(args).await,
            Commands::Diff(args) => commands::diff::run(args).await,
            Commands::Extract(args) => commands::transfer::run_extract(args).await,
            Commands::Inject(args) => commands::transfer::run_inject(args).await,
            Commands::List => commands::status::run_list().await,
            Commands::Status(args) => commands::status::run_status(args).await,
            Commands::Preflight(args) => commands::status::run_preflight(args).await,
            Commands::BuildImage(args) => commands::image::run(args).await,
            Commands::Destroy(args) => commands::destroy::run(args).await,
            Commands::DestroyAll(args) => commands::destroy::run_all(args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_with_multiple_sources() {
        let cli = Cli::try_parse_from([
            "shadow",
            "create",
            "--name",
            "demo",
            "/repos/a:acme/a",
            "/repos/b:acme/b",
        ])
        .unwrap();
        match cli.command {
            Commands::Create(args) => {
                assert_eq!(args.name.as_deref(), Some("demo"));
                assert_eq!(args.source, vec!["/repos/a:acme/a", "/repos/b:acme/b"]);
            }
            _ => panic!("expected Create"),
        }
    }

    #[test]
    fn parses_destroy_with_force_flag() {
        let cli = Cli::try_parse_from(["shadow", "destroy", "shadow-1", "--force"]).unwrap();
        match cli.command {
            Commands::Destroy(args) => {
                assert_eq!(args.id, "shadow-1");
                assert!(args.force);
            }
            _ => panic!("expected Destroy"),
        }
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["shadow", "frobnicate"]).is_err());
    }
}

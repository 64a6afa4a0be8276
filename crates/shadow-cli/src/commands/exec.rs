use std::time::Duration;

use clap::Args;

use crate::envelope;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Args)]
pub struct ExecArgs {
    /// Id of the shadow to run the command in
    pub id: String,

    /// Timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Command and arguments to run
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

pub async fn run_exec(args: ExecArgs) -> i32 {
    let manager = super::manager();
    let shadow = match manager.get(&args.id).await {
        Ok(Some(shadow)) => shadow,
        Ok(None) => {
            return envelope::err(&shadow_manager::Error::NotFound {
                message: format!("no such shadow: {}", args.id),
            });
        }
        Err(e) => return envelope::err(&e),
    };

    match shadow.exec(&args.command, Duration::from_secs(args.timeout)).await {
        Ok(result) => envelope::ok(result),
        Err(e) => envelope::err(&e),
    }
}

#[derive(Args)]
pub struct ExecBatchArgs {
    /// Id of the shadow to run the commands in
    pub id: String,

    /// Timeout in seconds, applied to each step
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Stop at the first failing step (default true)
    #[arg(long, default_value_t = true)]
    pub fail_fast: bool,

    /// A command to run, whitespace-split; repeat for each step
    #[arg(long = "command", required = true)]
    pub commands: Vec<String>,
}

pub async fn run_exec_batch(args: ExecBatchArgs) -> i32 {
    let manager = super::manager();
    let shadow = match manager.get(&args.id).await {
        Ok(Some(shadow)) => shadow,
        Ok(None) => {
            return envelope::err(&shadow_manager::Error::NotFound {
                message: format!("no such shadow: {}", args.id),
            });
        }
        Err(e) => return envelope::err(&e),
    };

    let commands: Vec<Vec<String>> = args
        .commands
        .iter()
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .collect();

    match shadow
        .exec_batch(&commands, Duration::from_secs(args.timeout), args.fail_fast)
        .await
    {
        Ok(result) => envelope::ok(result),
        Err(e) => envelope::err(&e),
    }
}

#[derive(Args)]
pub struct ShellArgs {
    /// Id of the shadow to attach to
    pub id: String,
}

/// Hands over the terminal via `execvp`; only returns if the attach itself
/// fails to start.
#[cfg(unix)]
pub async fn run_shell(args: ShellArgs) -> i32 {
    let manager = super::manager();
    let shadow = match manager.get(&args.id).await {
        Ok(Some(shadow)) => shadow,
        Ok(None) => {
            return envelope::err(&shadow_manager::Error::NotFound {
                message: format!("no such shadow: {}", args.id),
            });
        }
        Err(e) => return envelope::err(&e),
    };
    envelope::err(&shadow.shell())
}

#[cfg(not(unix))]
pub async fn run_shell(_args: ShellArgs) -> i32 {
    envelope::err(&shadow_manager::Error::Internal(
        "interactive shell is only supported on unix".to_string(),
    ))
}

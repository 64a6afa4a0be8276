use clap::Args;

use shadow_manager::CreateOptions;

use crate::envelope;

#[derive(Args)]
pub struct CreateArgs {
    /// One or more `<local_path>:<org>/<name>[@ref]` mappings
    #[arg(required = true)]
    pub source: Vec<String>,

    /// Name for the shadow (defaults to a generated id)
    #[arg(long)]
    pub name: Option<String>,

    /// Base image tag to use instead of the default
    #[arg(long)]
    pub image: Option<String>,

    /// Additional `KEY=VALUE` environment variables passed into the container
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Run a smoke test before returning
    #[arg(long)]
    pub verify: bool,
}

pub async fn run(args: CreateArgs) -> i32 {
    let env = match parse_env(&args.env) {
        Ok(env) => env,
        Err(message) => {
            return envelope::err(&shadow_manager::Error::InvalidInput { message });
        }
    };

    let opts = CreateOptions {
        name: args.name,
        image: args.image,
        env,
        verify: args.verify,
    };

    match super::manager().create(&args.source, opts).await {
        Ok(shadow) => envelope::ok(shadow.to_info()),
        Err(e) => envelope::err(&e),
    }
}

fn parse_env(pairs: &[String]) -> Result<Vec<(String, String)>, String> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| format!("invalid --env value, expected KEY=VALUE: {pair:?}"))
        })
        .collect()
}

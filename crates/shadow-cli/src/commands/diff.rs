use clap::Args;

use crate::envelope;

#[derive(Args)]
pub struct DiffArgs {
    /// Id of the shadow to diff
    pub id: String,

    /// Restrict the diff to paths under this subtree
    #[arg(long)]
    pub subtree: Option<String>,
}

pub async fn run(args: DiffArgs) -> i32 {
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

    match shadow.diff(args.subtree.as_deref()) {
        Ok(changes) => envelope::ok(changes),
        Err(e) => envelope::err(&e),
    }
}

use clap::Args;

use crate::envelope;

#[derive(Args)]
pub struct SourceArgs {
    /// Id of the shadow to modify
    pub id: String,

    /// `<local_path>:<org>/<name>[@ref]` mapping to add or sync
    pub source: String,
}

pub async fn run_add(args: SourceArgs) -> i32 {
    match super::manager().add_source(&args.id, &args.source).await {
        Ok(shadow) => envelope::ok(shadow.to_info()),
        Err(e) => envelope::err(&e),
    }
}

pub async fn run_sync(args: SourceArgs) -> i32 {
    match super::manager().sync_source(&args.id, &args.source).await {
        Ok(shadow) => envelope::ok(shadow.to_info()),
        Err(e) => envelope::err(&e),
    }
}

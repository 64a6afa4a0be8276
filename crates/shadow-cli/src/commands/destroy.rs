use clap::Args;
use serde::Serialize;

use crate::envelope;

#[derive(Serialize)]
struct DestroyOutput {
    destroyed: String,
}

#[derive(Args)]
pub struct DestroyArgs {
    /// Id of the shadow to destroy
    pub id: String,

    /// Continue even if the container is already gone
    #[arg(long)]
    pub force: bool,
}

pub async fn run(args: DestroyArgs) -> i32 {
    match super::manager().destroy(&args.id, args.force).await {
        Ok(()) => envelope::ok(DestroyOutput { destroyed: args.id }),
        Err(e) => envelope::err(&e),
    }
}

#[derive(Args)]
pub struct DestroyAllArgs {
    /// Continue past individual failures
    #[arg(long)]
    pub force: bool,
}

pub async fn run_all(args: DestroyAllArgs) -> i32 {
    match super::manager().destroy_all(args.force).await {
        Ok(()) => envelope::ok(serde_json::json!({ "destroyed_all": true })),
        Err(e) => envelope::err(&e),
    }
}

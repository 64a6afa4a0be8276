use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::envelope;

#[derive(Serialize)]
struct TransferResult {
    bytes: u64,
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Id of the shadow to extract from
    pub id: String,

    /// Path inside the shadow's workspace (must start with /workspace)
    pub container_path: String,

    /// Destination path on the host
    pub host_path: PathBuf,
}

pub async fn run_extract(args: ExtractArgs) -> i32 {
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

    match shadow.extract(&args.container_path, &args.host_path) {
        Ok(bytes) => envelope::ok(TransferResult { bytes }),
        Err(e) => envelope::err(&e),
    }
}

#[derive(Args)]
pub struct InjectArgs {
    /// Id of the shadow to inject into
    pub id: String,

    /// Source path on the host
    pub host_path: PathBuf,

    /// Destination path inside the shadow's workspace (must start with /workspace)
    pub container_path: String,
}

pub async fn run_inject(args: InjectArgs) -> i32 {
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

    match shadow.inject(&args.host_path, &args.container_path) {
        Ok(bytes) => envelope::ok(TransferResult { bytes }),
        Err(e) => envelope::err(&e),
    }
}

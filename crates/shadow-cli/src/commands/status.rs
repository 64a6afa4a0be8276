use clap::Args;
use serde::Serialize;

use crate::envelope;

#[derive(Args)]
pub struct StatusArgs {
    /// Id of the shadow to inspect
    pub id: String,
}

#[derive(Serialize)]
struct StatusOutput {
    #[serde(flatten)]
    info: shadow_manager::ShadowInfo,
    health: shadow_manager::PreflightReport,
}

pub async fn run_status(args: StatusArgs) -> i32 {
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

    match shadow_manager::health(&shadow).await {
        Ok(health) => envelope::ok(StatusOutput {
            info: shadow.to_info(),
            health,
        }),
        Err(e) => envelope::err(&e),
    }
}

pub async fn run_list() -> i32 {
    let manager = super::manager();
    let ids = match manager.list() {
        Ok(ids) => ids,
        Err(e) => return envelope::err(&e),
    };

    let mut infos = Vec::with_capacity(ids.len());
    for id in ids {
        match manager.get(&id).await {
            Ok(Some(shadow)) => infos.push(shadow.to_info()),
            Ok(None) => continue,
            Err(e) => return envelope::err(&e),
        }
    }
    envelope::ok(infos)
}

#[derive(Args)]
pub struct PreflightArgs {
    /// Id of an existing shadow to check (omit to run host-level preflight)
    pub id: Option<String>,

    /// Base image tag to check for, for host-level preflight
    #[arg(long)]
    pub image: Option<String>,
}

pub async fn run_preflight(args: PreflightArgs) -> i32 {
    match args.id {
        Some(id) => {
            let manager = super::manager();
            let shadow = match manager.get(&id).await {
                Ok(Some(shadow)) => shadow,
                Ok(None) => {
                    return envelope::err(&shadow_manager::Error::NotFound {
                        message: format!("no such shadow: {id}"),
                    });
                }
                Err(e) => return envelope::err(&e),
            };
            match shadow_manager::preflight_environment(&shadow).await {
                Ok(report) => envelope::ok(report),
                Err(e) => envelope::err(&e),
            }
        }
        None => {
            let image = args.image.unwrap_or_else(|| shadow_manager::DEFAULT_IMAGE_NAME.to_string());
            envelope::ok(shadow_manager::preflight_host(&image).await)
        }
    }
}

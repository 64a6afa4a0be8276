use clap::Args;
use serde::Serialize;

use crate::envelope;

#[derive(Args)]
pub struct BuildImageArgs {
    /// Image tag to build (defaults to the engine's default tag)
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Serialize)]
struct BuildImageOutput {
    tag: String,
}

pub async fn run(args: BuildImageArgs) -> i32 {
    let Some(backend) = shadow_runtime::detect_backend() else {
        return envelope::err(&shadow_manager::Error::ContainerRuntimeUnavailable);
    };
    let tag = args.tag.unwrap_or_else(|| shadow_manager::DEFAULT_IMAGE_NAME.to_string());
    let builder = shadow_image::ImageBuilder::new(backend);

    match builder.ensure_image(&tag, |line| println!("{line}")).await {
        Ok(tag) => envelope::ok(BuildImageOutput { tag }),
        Err(e) => envelope::err(&e.into()),
    }
}

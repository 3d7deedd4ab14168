//! Convert command - image file in, GLB file out

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use tracing::info;

use crate::domain::{Finish, ModelPipeline};
use crate::infrastructure::logging;

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Source image (PNG, JPEG, WebP)
    #[arg(long, short)]
    pub input: PathBuf,

    /// Destination GLB file
    #[arg(long, short)]
    pub output: PathBuf,

    /// Metal finish of the relief
    #[arg(long, value_enum, default_value_t = FinishArg::Gold)]
    pub finish: FinishArg,

    /// Fail instead of writing an empty model when nothing traces
    #[arg(long)]
    pub reject_empty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FinishArg {
    Gold,
    Silver,
    Bronze,
    Copper,
}

impl From<FinishArg> for Finish {
    fn from(arg: FinishArg) -> Self {
        match arg {
            FinishArg::Gold => Finish::Gold,
            FinishArg::Silver => Finish::Silver,
            FinishArg::Bronze => Finish::Bronze,
            FinishArg::Copper => Finish::Copper,
        }
    }
}

pub async fn run(args: ConvertArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = super::serve::load_config()?;
    logging::init_logging(&config.logging);

    let image = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let pipeline = ModelPipeline::from_config(&config.pipeline).with_reject_empty(args.reject_empty);
    let finish = Finish::from(args.finish);
    let output = tokio::task::spawn_blocking(move || pipeline.run(&image, finish)).await??;

    tokio::fs::write(&args.output, &output.artifact.bytes)
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        output = %args.output.display(),
        paths = output.path_count,
        vertices = output.artifact.vertex_count,
        triangles = output.artifact.triangle_count,
        empty = output.empty,
        "Model written"
    );

    Ok(())
}

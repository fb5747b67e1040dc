use std::env;

use anyhow::{Result, bail};
use blas_builder::Manifest;
use log::{error, info};

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let manifest = Manifest::from_args(&args)?;

    let mut failed = 0;
    for (job, result) in manifest.jobs.iter().zip(manifest.run()) {
        match result {
            Ok(report) => info!(
                "{} -> {}: {} triangles, {} nodes ({} leaves, depth {}) in {:.4}s",
                report.input.display(),
                report.output.display(),
                report.triangles,
                report.nodes_used,
                report.leaves,
                report.depth,
                report.build_time.as_secs_f32()
            ),
            Err(err) => {
                error!("{}: {err}", job.input.display());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} meshes failed to convert", failed, manifest.jobs.len());
    }

    Ok(())
}

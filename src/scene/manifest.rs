use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use super::{BLAS_EXTENSION, ConversionReport, convert};
use crate::error::BlasError;

/// One mesh to convert.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Job {
    pub input: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl Job {
    pub fn new(input: impl Into<PathBuf>, output: Option<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output,
        }
    }

    /// Explicit output, or the input path with a `.blas` extension.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension(BLAS_EXTENSION))
    }

    pub fn run(&self) -> Result<ConversionReport, BlasError> {
        convert(&self.input, self.output_path())
    }
}

/// Ordered list of meshes to convert, e.g.
///
/// ```yaml
/// jobs:
///   - input: ground.obj
///     output: ground.blas
///   - input: statue.obj
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Manifest {
    pub jobs: Vec<Job>,
}

impl Manifest {
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse manifest")
    }

    /// Loads a manifest file; relative paths inside it are taken relative to
    /// the manifest's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let mut manifest = Self::parse(&contents)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;

        if let Some(base) = path.parent() {
            for job in &mut manifest.jobs {
                job.input = base.join(&job.input);
                if let Some(output) = &mut job.output {
                    *output = base.join(&*output);
                }
            }
        }

        Ok(manifest)
    }

    /// Builds a manifest from command line arguments: a single `.yaml`/`.yml`
    /// manifest, a single mesh, or `<input> <output>` pairs.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        match args {
            [] => bail!("Usage: blas-builder <manifest.yaml> | <input.obj> [<output.blas>] ..."),
            [single] => {
                let path = Path::new(single.as_ref());
                let is_manifest = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| matches!(ext, "yaml" | "yml"));

                if is_manifest {
                    Self::from_path(path)
                } else {
                    Ok(Self {
                        jobs: vec![Job::new(path, None)],
                    })
                }
            }
            pairs if pairs.len() % 2 == 0 => Ok(Self {
                jobs: pairs
                    .chunks_exact(2)
                    .map(|pair| {
                        Job::new(pair[0].as_ref(), Some(PathBuf::from(pair[1].as_ref())))
                    })
                    .collect(),
            }),
            _ => bail!("Expected <input> <output> pairs, got {} paths", args.len()),
        }
    }

    /// Converts every job in order; one failure does not stop the rest.
    pub fn run(&self) -> Vec<Result<ConversionReport, BlasError>> {
        self.jobs.iter().map(Job::run).collect()
    }
}

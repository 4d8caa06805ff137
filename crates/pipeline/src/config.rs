use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not set and no default is available")]
    Missing { var: &'static str },

    #[error("{var} has invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// The external folding program and how to invoke it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldingTool {
    /// Executable to launch (e.g. `python3`).
    pub program: String,
    /// Script passed as the first argument, if the program is an interpreter.
    pub script: Option<PathBuf>,
    /// `--max_template_date` passed to every run.
    pub max_template_date: String,
}

impl FoldingTool {
    /// Fixed argument list for one job. Acceleration is always forced on.
    pub fn args(&self, fasta_path: &Path, data_dir: &Path, job_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(7);
        if let Some(script) = &self.script {
            args.push(script.clone().into_os_string());
        }
        args.push(flag("--fasta_paths=", fasta_path));
        args.push(format!("--max_template_date={}", self.max_template_date).into());
        args.push(flag("--data_dir=", data_dir));
        args.push(flag("--output_dir=", job_dir));
        args.push("--use_gpu=true".into());
        args.push("--enable_gpu_relax=false".into());
        args
    }
}

fn flag(name: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(name);
    arg.push(path.as_os_str());
    arg
}

/// Pipeline configuration: directories, tool invocation, and capacity.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Reference databases passed to the tool.
    pub data_dir: PathBuf,
    /// Parent of the per-job output directories.
    pub output_dir: PathBuf,
    /// Where per-job FASTA inputs are written.
    pub sequences_dir: PathBuf,
    pub tool: FoldingTool,
    /// Interval between GPU telemetry samples while a job runs.
    pub telemetry_interval: Duration,
    /// Jobs allowed to run the tool at the same time.
    pub max_concurrent_jobs: usize,
    /// Jobs admitted (queued plus running) before submissions are rejected.
    pub max_queued_jobs: usize,
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                         |
    /// |---------------------------|---------------------------------|
    /// | `FOLD_BASE_DIR`           | `$HOME`                         |
    /// | `ALPHAFOLD_REPO`          | `<base>/alphafold`              |
    /// | `ALPHAFOLD_DATA_DIR`      | `<base>/alphafold_data`         |
    /// | `ALPHAFOLD_OUTPUT_DIR`    | `<base>/alphafold_output`       |
    /// | `ALPHAFOLD_SEQUENCES_DIR` | `<base>/alphafold_sequences`    |
    /// | `FOLD_TOOL_PROGRAM`       | `python3`                       |
    /// | `FOLD_TOOL_SCRIPT`        | `<repo>/docker/run_docker.py`   |
    /// | `MAX_TEMPLATE_DATE`       | `2022-01-01`                    |
    /// | `TELEMETRY_INTERVAL_SECS` | `10`                            |
    /// | `MAX_CONCURRENT_JOBS`     | `2`                             |
    /// | `MAX_QUEUED_JOBS`         | `32`                            |
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_dir = match std::env::var_os("FOLD_BASE_DIR").or_else(|| std::env::var_os("HOME")) {
            Some(dir) => PathBuf::from(dir),
            None => return Err(ConfigError::Missing { var: "FOLD_BASE_DIR" }),
        };

        let repo = env_path("ALPHAFOLD_REPO", || base_dir.join("alphafold"));
        let data_dir = env_path("ALPHAFOLD_DATA_DIR", || base_dir.join("alphafold_data"));
        let output_dir = env_path("ALPHAFOLD_OUTPUT_DIR", || base_dir.join("alphafold_output"));
        let sequences_dir =
            env_path("ALPHAFOLD_SEQUENCES_DIR", || base_dir.join("alphafold_sequences"));

        let tool = FoldingTool {
            program: std::env::var("FOLD_TOOL_PROGRAM").unwrap_or_else(|_| "python3".into()),
            script: Some(env_path("FOLD_TOOL_SCRIPT", || {
                repo.join("docker").join("run_docker.py")
            })),
            max_template_date: std::env::var("MAX_TEMPLATE_DATE")
                .unwrap_or_else(|_| "2022-01-01".into()),
        };

        let telemetry_interval_secs: u64 =
            nonzero("TELEMETRY_INTERVAL_SECS", env_parse("TELEMETRY_INTERVAL_SECS", 10)?)?;
        let max_concurrent_jobs: usize =
            nonzero("MAX_CONCURRENT_JOBS", env_parse("MAX_CONCURRENT_JOBS", 2)?)?;
        let max_queued_jobs: usize = env_parse("MAX_QUEUED_JOBS", 32)?;

        Ok(Self {
            data_dir,
            output_dir,
            sequences_dir,
            tool,
            telemetry_interval: Duration::from_secs(telemetry_interval_secs),
            max_concurrent_jobs,
            max_queued_jobs: max_queued_jobs.max(max_concurrent_jobs),
        })
    }

    /// Create the data, output, and sequence directories if missing.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.data_dir, &self.output_dir, &self.sequences_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// Output directory of one job.
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.output_dir.join(job_id)
    }

    /// FASTA input path of one job.
    pub fn fasta_path(&self, job_id: &str) -> PathBuf {
        self.sequences_dir.join(format!("{job_id}.fasta"))
    }
}

fn env_path(var: &str, default: impl FnOnce() -> PathBuf) -> PathBuf {
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(default)
}

fn env_parse<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

/// Reject a zero value for settings where zero would stall or spin.
fn nonzero<T>(var: &'static str, value: T) -> Result<T, ConfigError>
where
    T: Default + PartialEq + ToString,
{
    if value == T::default() {
        return Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        });
    }
    Ok(value)
}

//! Interpretation of the folding tool's text output and result layout.
//!
//! Progress here is a heuristic: two fixed milestones in the tool's stdout
//! are mapped to fixed checkpoint percentages. It does not measure how much
//! work remains.

use crate::job::GpuVerification;

/// Substrings in a stdout line that count as evidence of GPU use (case-sensitive).
pub const GPU_OUTPUT_KEYWORDS: &[&str] = &["GPU", "gpu", "CUDA", "cuda", "device:GPU"];

/// Substrings in the tool's `log.txt` that count as evidence of GPU use.
pub const GPU_LOG_KEYWORDS: &[&str] = &[
    "Using GPU",
    "CUDA_VISIBLE_DEVICES",
    "TensorFlow device",
    "device:GPU",
    "Found device",
    "XLA_PYTHON_CLIENT_MEM_FRACTION",
    "cuda",
    "jaxlib.xla_extension.GpuDevice",
];

/// Stdout markers and the checkpoint progress they map to, checked in order.
pub const PROGRESS_MILESTONES: &[(&str, u8)] =
    &[("Running model", 30), ("Relaxing structure", 70)];

/// Maximum number of log lines kept as verification evidence.
pub const MAX_LOG_EVIDENCE: usize = 10;

/// File name of the canonical artifact copy inside the job directory.
pub const CANONICAL_RESULT_FILE: &str = "ranked_0.pdb";

/// Log file written by the tool inside its result directory.
pub const RESULT_LOG_FILE: &str = "log.txt";

/// What one stdout line tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineSignals<'a> {
    /// The trimmed line, when it mentions GPU usage.
    pub gpu_evidence: Option<&'a str>,
    /// Checkpoint progress, when the line hits a milestone.
    pub progress: Option<u8>,
}

/// Scan a single stdout line for GPU evidence and progress milestones.
pub fn scan_line(line: &str) -> LineSignals<'_> {
    let gpu_evidence = GPU_OUTPUT_KEYWORDS
        .iter()
        .any(|kw| line.contains(kw))
        .then(|| line.trim());

    let progress = PROGRESS_MILESTONES
        .iter()
        .find(|(marker, _)| line.contains(marker))
        .map(|(_, pct)| *pct);

    LineSignals {
        gpu_evidence,
        progress,
    }
}

/// Build a verification verdict from the contents of the tool's log file.
///
/// Keeps the first [`MAX_LOG_EVIDENCE`] matching lines, newline-joined.
/// A line matching several keywords counts once.
pub fn verify_gpu_log(log: &str) -> GpuVerification {
    let evidence: Vec<&str> = log
        .lines()
        .filter(|line| GPU_LOG_KEYWORDS.iter().any(|kw| line.contains(kw)))
        .map(str::trim)
        .take(MAX_LOG_EVIDENCE)
        .collect();

    if evidence.is_empty() {
        GpuVerification {
            gpu_used: false,
            evidence: "No GPU usage evidence found in logs".to_string(),
        }
    } else {
        GpuVerification {
            gpu_used: true,
            evidence: evidence.join("\n"),
        }
    }
}

/// Pick the result directory: names sorted ascending, last one wins.
///
/// This is lexicographic order, not modification time.
pub fn latest_result_dir<I, S>(names: I) -> Option<S>
where
    I: IntoIterator<Item = S>,
    S: Ord,
{
    names.into_iter().max()
}

/// `true` for the top-ranked model file (`*ranked_0*.pdb`).
pub fn is_top_ranked_model(file_name: &str) -> bool {
    file_name.ends_with(".pdb") && file_name.contains("ranked_0")
}

/// FASTA input for a single sequence.
pub fn fasta_record(name: &str, sequence: &str) -> String {
    format!(">{name}\n{sequence}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

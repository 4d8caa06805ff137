//! Parsers for `nvidia-smi` CSV output and `docker ps` listings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Utilization reading for one GPU.
///
/// Fields are `None` when the driver reports `[N/A]` or the value does not
/// parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuUtilization {
    pub gpu_index: u32,
    pub utilization_percent: Option<u32>,
    pub memory_used_mb: Option<u32>,
    pub memory_total_mb: Option<u32>,
}

/// One telemetry sample covering every visible GPU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuTelemetry {
    pub gpus: Vec<GpuUtilization>,
    pub sampled_at: Timestamp,
}

/// A running container as reported by `docker ps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEntry {
    pub id: String,
    pub name: String,
    pub image: String,
}

/// Parse the output of
/// `nvidia-smi --query-gpu=utilization.gpu,memory.used,memory.total --format=csv,noheader,nounits`.
///
/// One line per GPU; lines with fewer than three fields are skipped. The
/// GPU index is the line's position among the accepted lines.
pub fn parse_utilization(text: &str) -> Vec<GpuUtilization> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() < 3 {
                return None;
            }
            Some((
                parse_number(fields[0]),
                parse_number(fields[1]),
                parse_number(fields[2]),
            ))
        })
        .enumerate()
        .map(|(idx, (util, used, total))| GpuUtilization {
            gpu_index: idx as u32,
            utilization_percent: util,
            memory_used_mb: used,
            memory_total_mb: total,
        })
        .collect()
}

/// Accepts plain numbers and tolerates a trailing unit (`"45 %"`, `"1024 MiB"`).
fn parse_number(field: &str) -> Option<u32> {
    field.split_whitespace().next()?.parse().ok()
}

/// Parse a headed CSV table (`--format=csv`) into one map per data row,
/// keyed by the header names.
///
/// Returns an empty vec when there is no data row.
pub fn parse_csv_table(text: &str) -> Vec<BTreeMap<String, String>> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    let headers: Vec<String> = match lines.next() {
        Some(header) => header.split(',').map(|h| h.trim().to_string()).collect(),
        None => return Vec::new(),
    };

    lines
        .map(|line| {
            headers
                .iter()
                .cloned()
                .zip(line.split(',').map(|v| v.trim().to_string()))
                .collect()
        })
        .collect()
}

/// Parse `docker ps --format "{{.ID}}\t{{.Names}}\t{{.Image}}"` output.
pub fn parse_container_listing(text: &str) -> Vec<ContainerEntry> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.trim().split('\t');
            let id = parts.next()?.trim();
            let name = parts.next()?.trim();
            let image = parts.next()?.trim();
            if id.is_empty() {
                return None;
            }
            Some(ContainerEntry {
                id: id.to_string(),
                name: name.to_string(),
                image: image.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_one_line_per_gpu() {
        let gpus = parse_utilization("87, 30512, 40960\n3, 512, 40960\n");
        assert_eq!(gpus.len(), 2);
        assert_eq!(gpus[0].gpu_index, 0);
        assert_eq!(gpus[0].utilization_percent, Some(87));
        assert_eq!(gpus[0].memory_used_mb, Some(30512));
        assert_eq!(gpus[1].gpu_index, 1);
        assert_eq!(gpus[1].memory_total_mb, Some(40960));
    }

    #[test]
    fn utilization_tolerates_units_and_na() {
        let gpus = parse_utilization("45 %, 1024 MiB, [N/A]\n");
        assert_eq!(gpus.len(), 1);
        assert_eq!(gpus[0].utilization_percent, Some(45));
        assert_eq!(gpus[0].memory_used_mb, Some(1024));
        assert_eq!(gpus[0].memory_total_mb, None);
    }

    #[test]
    fn utilization_skips_short_lines() {
        assert!(parse_utilization("No devices were found\n").is_empty());
        assert!(parse_utilization("").is_empty());
    }

    #[test]
    fn csv_table_maps_headers_to_values() {
        let text = "index, name, temperature.gpu\n0, NVIDIA A100, 41\n1, NVIDIA A100, 39\n";
        let rows = parse_csv_table(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "NVIDIA A100");
        assert_eq!(rows[1]["index"], "1");
        assert_eq!(rows[1]["temperature.gpu"], "39");
    }

    #[test]
    fn csv_table_header_only_is_empty() {
        assert!(parse_csv_table("index, name\n").is_empty());
    }

    #[test]
    fn container_listing_requires_three_fields() {
        let text = "a1b2c3\talphafold_run\talphafold:latest\nbroken-line\n";
        let containers = parse_container_listing(text);
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id, "a1b2c3");
        assert_eq!(containers[0].image, "alphafold:latest");
    }
}

//! GPU discovery.

use std::process::Command;

use super::{GpuError, GpuResult};

/// List device ids reported by `nvidia-smi`.
pub fn detect_gpus() -> GpuResult<Vec<u32>> {
    let output = Command::new("nvidia-smi")
        .args(["--query-gpu=index", "--format=csv,noheader"])
        .output()
        .map_err(|e| GpuError::QueryFailed(format!("Failed to run nvidia-smi: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GpuError::QueryFailed(format!(
            "nvidia-smi exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let ids = parse_query_output(&stdout)?;
    if ids.is_empty() {
        return Err(GpuError::NoGpus);
    }

    tracing::debug!("Detected GPUs: {:?}", ids);
    Ok(ids)
}

/// Parse a comma-separated id list such as `0,1,3`.
pub fn parse_gpu_list(list: &str) -> GpuResult<Vec<u32>> {
    let ids = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| GpuError::InvalidList(list.to_string())))
        .collect::<GpuResult<Vec<u32>>>()?;

    if ids.is_empty() {
        return Err(GpuError::NoGpus);
    }
    Ok(ids)
}

/// One id per line.
fn parse_query_output(stdout: &str) -> GpuResult<Vec<u32>> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            l.parse()
                .map_err(|_| GpuError::QueryFailed(format!("unexpected nvidia-smi output: {}", l)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_id_lists() {
        assert_eq!(parse_gpu_list("0,1, 3").unwrap(), vec![0, 1, 3]);
        assert_eq!(parse_gpu_list("2").unwrap(), vec![2]);
        assert!(matches!(parse_gpu_list(""), Err(GpuError::NoGpus)));
        assert!(matches!(parse_gpu_list("0,a"), Err(GpuError::InvalidList(_))));
    }

    #[test]
    fn parses_query_output() {
        assert_eq!(parse_query_output("0\n1\n\n").unwrap(), vec![0, 1]);
        assert!(parse_query_output("GPU 0\n").is_err());
    }
}

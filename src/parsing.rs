use thiserror::Error;

/// Failure to interpret a Kubernetes quantity string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("unsupported quantity suffix in {0:?}")]
    UnsupportedSuffix(String),
    #[error("invalid numeric value in {0:?}")]
    InvalidNumber(String),
}

/// Recognized CPU quantity suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuUnit {
    Millicores,
    Cores,
}

/// Recognized memory quantity suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUnit {
    Mebibytes,
    Gibibytes,
    Bytes,
}

// Quantities are plain decimal; exponent notation is malformed, not scaled.
fn parse_decimal(value: &str, original: &str) -> Result<f64, QuantityError> {
    if value.contains(['e', 'E']) {
        return Err(QuantityError::InvalidNumber(original.to_string()));
    }
    value
        .parse()
        .map_err(|_| QuantityError::InvalidNumber(original.to_string()))
}

fn split_cpu_unit(q: &str) -> (&str, CpuUnit) {
    match q.strip_suffix('m') {
        Some(stripped) => (stripped, CpuUnit::Millicores),
        None => (q, CpuUnit::Cores),
    }
}

fn split_memory_unit(q: &str) -> Result<(&str, MemoryUnit), QuantityError> {
    if let Some(stripped) = q.strip_suffix("Mi") {
        return Ok((stripped, MemoryUnit::Mebibytes));
    }
    if let Some(stripped) = q.strip_suffix("Gi") {
        return Ok((stripped, MemoryUnit::Gibibytes));
    }
    if q.ends_with(|c: char| c.is_ascii_digit()) {
        return Ok((q, MemoryUnit::Bytes));
    }
    Err(QuantityError::UnsupportedSuffix(q.to_string()))
}

/// Parse a CPU quantity into millicores. `"250m"` passes through as 250;
/// an unsuffixed value is interpreted as cores and scaled by 1000.
pub fn parse_cpu_millicores(q: &str) -> Result<i64, QuantityError> {
    let q = q.trim();
    if q.is_empty() {
        return Err(QuantityError::InvalidNumber(q.to_string()));
    }
    let (value, unit) = split_cpu_unit(q);
    match unit {
        CpuUnit::Millicores => value
            .parse::<i64>()
            .map_err(|_| QuantityError::InvalidNumber(q.to_string())),
        CpuUnit::Cores => {
            let cores = parse_decimal(value, q)?;
            Ok((cores * 1000.0).round() as i64)
        }
    }
}

/// Parse a memory quantity into mebibytes. `"512Mi"` passes through as 512,
/// `"2Gi"` scales by 1024, a bare number is raw bytes divided by 2^20
/// (rounded). Ki/Ti and decimal suffixes are rejected.
pub fn parse_memory_mib(q: &str) -> Result<i64, QuantityError> {
    let q = q.trim();
    if q.is_empty() {
        return Err(QuantityError::InvalidNumber(q.to_string()));
    }
    let (value, unit) = split_memory_unit(q)?;
    let v = parse_decimal(value, q)?;
    let mib = match unit {
        MemoryUnit::Mebibytes => v,
        MemoryUnit::Gibibytes => v * 1024.0,
        MemoryUnit::Bytes => v / (1024.0 * 1024.0),
    };
    Ok(mib.round() as i64)
}

/// Parse a CPU quantity from the node status or `metrics.k8s.io`, which
/// report nanocores (`"156354618n"`) and microcores alongside the request
/// grammar.
pub fn parse_metrics_cpu_millicores(q: &str) -> Result<i64, QuantityError> {
    let q = q.trim();
    if let Some(value) = q.strip_suffix('n') {
        let nanocores = parse_decimal(value, q)?;
        return Ok((nanocores / 1_000_000.0).round() as i64);
    }
    if let Some(value) = q.strip_suffix('u') {
        let microcores = parse_decimal(value, q)?;
        return Ok((microcores / 1_000.0).round() as i64);
    }
    parse_cpu_millicores(q)
}

/// Parse a memory quantity from the node status or `metrics.k8s.io`, which
/// report kibibytes (`"8129128Ki"`) alongside the request grammar.
pub fn parse_metrics_memory_mib(q: &str) -> Result<i64, QuantityError> {
    let q = q.trim();
    if let Some(value) = q.strip_suffix("Ki") {
        let kib = parse_decimal(value, q)?;
        return Ok((kib / 1024.0).round() as i64);
    }
    parse_memory_mib(q)
}

//! Target probes, one per validation type.
//!
//! A probe evaluates a rule's condition and returns a verdict. A probe that
//! cannot execute returns [`ProbeError`], which the executor maps to a check
//! result of `error` — distinct from `failed`, where the condition was
//! evaluated and found false.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use vigil_core::check::CheckStatus;
use vigil_core::config::EnvSnapshot;
use vigil_core::error::ProbeError;
use vigil_core::rule::Validation;

use crate::tls::CertificateExpiry;

/// Outcome of a successfully executed probe.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub status: CheckStatus,
    pub message: String,
}

impl ProbeOutcome {
    pub fn passed(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Passed,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Failed,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Warning,
            message: message.into(),
        }
    }
}

/// A single executable check against a target.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn evaluate(&self) -> Result<ProbeOutcome, ProbeError>;
}

/// Constructs probes for validations. The production factory wires real
/// filesystem, network and /proc access; tests substitute stubs.
pub trait ProbeFactory: Send + Sync {
    fn probe(&self, validation: &Validation) -> Box<dyn Probe>;
}

/// Production probe factory.
pub struct SystemProbeFactory {
    http: reqwest::Client,
    env: EnvSnapshot,
    tls: Arc<dyn CertificateExpiry>,
    http_cutoff: Duration,
}

impl SystemProbeFactory {
    /// `check_timeout` bounds how long the HTTP probe waits for a response.
    /// A response that completes within it but over the rule's limit is a
    /// `failed` check, not an unreachable target.
    pub fn new(env: EnvSnapshot, tls: Arc<dyn CertificateExpiry>, check_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            env,
            tls,
            http_cutoff: check_timeout,
        }
    }
}

impl ProbeFactory for SystemProbeFactory {
    fn probe(&self, validation: &Validation) -> Box<dyn Probe> {
        match validation {
            Validation::FilePermission {
                path,
                expected_mode,
            } => Box::new(PermissionProbe {
                path: path.clone(),
                expected_mode: expected_mode.clone(),
                expect_dir: false,
            }),
            Validation::DirectoryPermission {
                path,
                expected_mode,
            } => Box::new(PermissionProbe {
                path: path.clone(),
                expected_mode: expected_mode.clone(),
                expect_dir: true,
            }),
            Validation::SslCertificate {
                host,
                port,
                min_days_remaining,
            } => Box::new(SslCertificateProbe {
                host: host.clone(),
                port: *port,
                min_days_remaining: *min_days_remaining,
                inspector: self.tls.clone(),
            }),
            Validation::ResponseTime {
                url,
                max_time_ms,
                warn_time_ms,
            } => Box::new(ResponseTimeProbe {
                url: url.clone(),
                max_time_ms: *max_time_ms,
                warn_time_ms: *warn_time_ms,
                cutoff: self.http_cutoff,
                client: self.http.clone(),
            }),
            Validation::MemoryUsage { max_usage_pct } => Box::new(MemoryUsageProbe {
                max_usage_pct: *max_usage_pct,
            }),
            Validation::CpuUsage { max_usage_pct } => Box::new(CpuUsageProbe {
                max_usage_pct: *max_usage_pct,
            }),
            Validation::EnvValidation { required_vars } => Box::new(EnvValidationProbe {
                required_vars: required_vars.clone(),
                env: self.env.clone(),
            }),
        }
    }
}

// ── File and directory permissions ──────────────────────────────────────────

struct PermissionProbe {
    path: String,
    expected_mode: String,
    expect_dir: bool,
}

#[async_trait]
impl Probe for PermissionProbe {
    async fn evaluate(&self) -> Result<ProbeOutcome, ProbeError> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProbeError::Unreachable(format!(
                    "{} does not exist",
                    self.path
                )));
            }
            Err(e) => return Err(ProbeError::Io(e.to_string())),
        };

        if self.expect_dir != metadata.is_dir() {
            let kind = if self.expect_dir { "directory" } else { "file" };
            return Ok(ProbeOutcome::failed(format!(
                "{} is not a {kind}",
                self.path
            )));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let actual = metadata.permissions().mode() & 0o7777;
            let expected = u32::from_str_radix(&self.expected_mode, 8).map_err(|_| {
                ProbeError::Io(format!("invalid expected mode {}", self.expected_mode))
            })?;

            if actual == expected {
                Ok(ProbeOutcome::passed(format!(
                    "{} has mode {:o}",
                    self.path, actual
                )))
            } else {
                Ok(ProbeOutcome::failed(format!(
                    "{} has mode {:o}, expected {:o}",
                    self.path, actual, expected
                )))
            }
        }

        #[cfg(not(unix))]
        {
            Err(ProbeError::Unsupported(
                "permission probes require a unix host".to_string(),
            ))
        }
    }
}

// ── SSL certificate expiry ──────────────────────────────────────────────────

struct SslCertificateProbe {
    host: String,
    port: u16,
    min_days_remaining: i64,
    inspector: Arc<dyn CertificateExpiry>,
}

#[async_trait]
impl Probe for SslCertificateProbe {
    async fn evaluate(&self) -> Result<ProbeOutcome, ProbeError> {
        let not_after = self.inspector.not_after(&self.host, self.port).await?;
        let days_remaining = (not_after - Utc::now()).num_days();

        debug!(host = %self.host, days_remaining, "Certificate expiry probed");

        if days_remaining >= self.min_days_remaining {
            Ok(ProbeOutcome::passed(format!(
                "certificate for {} valid for {} more days",
                self.host, days_remaining
            )))
        } else {
            Ok(ProbeOutcome::failed(format!(
                "certificate for {} expires in {} days, threshold {}",
                self.host, days_remaining, self.min_days_remaining
            )))
        }
    }
}

// ── Response time ───────────────────────────────────────────────────────────

struct ResponseTimeProbe {
    url: String,
    max_time_ms: u64,
    warn_time_ms: Option<u64>,
    cutoff: Duration,
    client: reqwest::Client,
}

#[async_trait]
impl Probe for ResponseTimeProbe {
    async fn evaluate(&self) -> Result<ProbeOutcome, ProbeError> {
        let start = std::time::Instant::now();
        // The cutoff is the check timeout, not the rule's limit: a response
        // that completes slowly is a measured failure, not an error.
        let response = self
            .client
            .get(&self.url)
            .timeout(self.cutoff)
            .send()
            .await
            .map_err(|e| ProbeError::Unreachable(format!("{}: {e}", self.url)))?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        if elapsed_ms > self.max_time_ms {
            Ok(ProbeOutcome::failed(format!(
                "{} answered {status} in {elapsed_ms}ms, limit {}ms",
                self.url, self.max_time_ms
            )))
        } else if self.warn_time_ms.is_some_and(|warn| elapsed_ms > warn) {
            Ok(ProbeOutcome::warning(format!(
                "{} answered {status} in {elapsed_ms}ms, above soft limit {}ms",
                self.url,
                self.warn_time_ms.unwrap_or_default()
            )))
        } else {
            Ok(ProbeOutcome::passed(format!(
                "{} answered {status} in {elapsed_ms}ms",
                self.url
            )))
        }
    }
}

// ── Resource usage ──────────────────────────────────────────────────────────

struct MemoryUsageProbe {
    max_usage_pct: f64,
}

#[async_trait]
impl Probe for MemoryUsageProbe {
    async fn evaluate(&self) -> Result<ProbeOutcome, ProbeError> {
        let meminfo = tokio::fs::read_to_string("/proc/meminfo")
            .await
            .map_err(|e| ProbeError::Unsupported(format!("/proc/meminfo: {e}")))?;
        let usage = parse_memory_usage_pct(&meminfo)
            .ok_or_else(|| ProbeError::Io("could not parse /proc/meminfo".to_string()))?;

        Ok(threshold_outcome("memory", usage, self.max_usage_pct))
    }
}

struct CpuUsageProbe {
    max_usage_pct: f64,
}

#[async_trait]
impl Probe for CpuUsageProbe {
    async fn evaluate(&self) -> Result<ProbeOutcome, ProbeError> {
        let first = read_cpu_sample().await?;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let second = read_cpu_sample().await?;

        let total = second.total.saturating_sub(first.total);
        let idle = second.idle.saturating_sub(first.idle);
        if total == 0 {
            return Err(ProbeError::Io("zero-length cpu sample".to_string()));
        }
        let usage = (1.0 - idle as f64 / total as f64) * 100.0;

        Ok(threshold_outcome("cpu", usage, self.max_usage_pct))
    }
}

fn threshold_outcome(resource: &str, usage: f64, max: f64) -> ProbeOutcome {
    if usage <= max {
        ProbeOutcome::passed(format!("{resource} usage {usage:.1}% within limit {max:.1}%"))
    } else {
        ProbeOutcome::failed(format!("{resource} usage {usage:.1}% exceeds limit {max:.1}%"))
    }
}

fn parse_memory_usage_pct(meminfo: &str) -> Option<f64> {
    let field = |name: &str| -> Option<u64> {
        meminfo
            .lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|value| value.parse().ok())
    };

    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total == 0 {
        return None;
    }
    Some((1.0 - available as f64 / total as f64) * 100.0)
}

struct CpuSample {
    total: u64,
    idle: u64,
}

async fn read_cpu_sample() -> Result<CpuSample, ProbeError> {
    let stat = tokio::fs::read_to_string("/proc/stat")
        .await
        .map_err(|e| ProbeError::Unsupported(format!("/proc/stat: {e}")))?;
    let line = stat
        .lines()
        .find(|line| line.starts_with("cpu "))
        .ok_or_else(|| ProbeError::Io("no aggregate cpu line in /proc/stat".to_string()))?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|value| value.parse().ok())
        .collect();
    if fields.len() < 5 {
        return Err(ProbeError::Io("short cpu line in /proc/stat".to_string()));
    }

    // idle + iowait count as idle time
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    let total = fields.iter().sum();
    Ok(CpuSample { total, idle })
}

// ── Environment validation ──────────────────────────────────────────────────

struct EnvValidationProbe {
    required_vars: Vec<String>,
    env: EnvSnapshot,
}

#[async_trait]
impl Probe for EnvValidationProbe {
    async fn evaluate(&self) -> Result<ProbeOutcome, ProbeError> {
        let missing: Vec<&str> = self
            .required_vars
            .iter()
            .filter(|name| !self.env.is_set(name))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(ProbeOutcome::passed(format!(
                "all {} required variables set",
                self.required_vars.len()
            )))
        } else {
            Ok(ProbeOutcome::failed(format!(
                "missing or empty variables: {}",
                missing.join(", ")
            )))
        }
    }
}

use crate::aws::{self, find_bucket, BucketLister, LockTable};
use crate::config;
use log::{debug, info};
use std::fmt::{Display, Formatter};
use std::io::Write;

/// Infrastructure that must exist before a release can be configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    ReleaseBucket,
    TfstateBucket,
    TflocksTable,
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Resource::ReleaseBucket => "release bucket",
            Resource::TfstateBucket => "terraform state bucket",
            Resource::TflocksTable => "terraform locks table",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceCheck {
    pub resource: Resource,
    pub exists: bool,
    /// Name of the resource found, or why it is considered missing.
    pub detail: String,
}

impl Display for ResourceCheck {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mark = if self.exists { '✓' } else { '✗' };
        write!(f, "  {mark} {}: {}", self.resource, self.detail)
    }
}

/// Outcome of checking every resource. All checks always run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceReport {
    pub checks: Vec<ResourceCheck>,
    pub problems: usize,
}

impl ResourceReport {
    fn record(&mut self, check: ResourceCheck) {
        if !check.exists {
            self.problems += 1;
        }
        self.checks.push(check);
    }

    pub fn is_ok(&self) -> bool {
        self.problems == 0
    }

    /// One line per resource, followed by a single remediation hint if anything is missing.
    pub fn write_to(&self, w: &mut dyn Write, setup_command: &str) -> std::io::Result<()> {
        for check in &self.checks {
            writeln!(w, "{check}")?;
        }
        writeln!(w)?;
        if !self.is_ok() {
            write!(w, "To set up AWS resources, please run:\n\n  {setup_command}\n\n")?;
        }
        Ok(())
    }
}

/// Check the release bucket, the terraform state bucket and the terraform locks table.
///
/// Buckets are listed once and shared by both bucket checks. Failing to list
/// buckets is the only error; a missing resource is a problem in the report.
pub async fn check_resources(
    settings: &config::Resources,
    buckets: &dyn BucketLister,
    locks: &dyn LockTable,
) -> Result<ResourceReport, aws::Error> {
    info!("Checking AWS resources");
    let listed = buckets.list_buckets().await?;
    debug!("{} buckets listed", listed.len());

    let mut report = ResourceReport::default();
    report.record(bucket_check(
        Resource::ReleaseBucket,
        &listed,
        &settings.release_bucket_prefix,
    ));
    report.record(bucket_check(
        Resource::TfstateBucket,
        &listed,
        &settings.tfstate_bucket_prefix,
    ));

    let table = &settings.tflocks_table;
    report.record(match locks.table_exists(table).await {
        Ok(true) => ResourceCheck {
            resource: Resource::TflocksTable,
            exists: true,
            detail: table.clone(),
        },
        Ok(false) => ResourceCheck {
            resource: Resource::TflocksTable,
            exists: false,
            detail: format!("table {table} not found"),
        },
        Err(err) => ResourceCheck {
            resource: Resource::TflocksTable,
            exists: false,
            detail: format!("unable to check table {table}: {err}"),
        },
    });

    debug!("{} resource problems", report.problems);
    Ok(report)
}

fn bucket_check(resource: Resource, listed: &[String], prefix: &str) -> ResourceCheck {
    match find_bucket(listed, prefix) {
        Some(name) => ResourceCheck {
            resource,
            exists: true,
            detail: name.to_string(),
        },
        None => ResourceCheck {
            resource,
            exists: false,
            detail: format!("no bucket found with prefix {prefix}"),
        },
    }
}

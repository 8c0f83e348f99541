//! The `init` subcommand: write a sample configuration file.

use std::path::Path;

use crate::errors::CliError;
use crate::output::print_success;

const CONFIG_PATH: &str = ".gcpspectre.yaml";

const SAMPLE_CONFIG: &str = r#"# gcpspectre configuration

# GCP project IDs to scan (required)
projects:
  # - my-project-id
  # - another-project

# Lookback window for utilization metrics (days)
idle_days: 7

# Age threshold for stale snapshots (days)
stale_days: 90

# Minimum monthly cost to report ($)
min_monthly_cost: 1.0

# Output format: text, json, sarif, or spectrehub
format: text

# Scan timeout
timeout: 10m

# Resources to exclude from scanning
# exclude:
#   resource_ids:
#     - "1234567890"
#   labels:
#     - env=production
#     - keep
"#;

pub fn run_init(force: bool) -> Result<(), CliError> {
    let path = Path::new(CONFIG_PATH);
    if !force && path.exists() {
        return Err(CliError::Config(format!(
            "{CONFIG_PATH} already exists (use --force to overwrite)"
        )));
    }

    std::fs::write(path, SAMPLE_CONFIG)?;
    print_success(&format!("Created {CONFIG_PATH}"));
    println!();
    println!("Next steps:");
    println!("  1. Edit {CONFIG_PATH} to add your project IDs");
    println!("  2. Authenticate: gcloud auth application-default login");
    println!("  3. Run: gcpspectre scan");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_parses() {
        let cfg: crate::config::FileConfig = serde_yaml::from_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(cfg.idle_days, Some(7));
        assert_eq!(cfg.stale_days, Some(90));
        assert_eq!(cfg.format.as_deref(), Some("text"));
        assert!(cfg.projects.is_empty());
    }
}

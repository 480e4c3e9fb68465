// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, OracleBackend, SkeletonConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "synskel.toml";

/// Find the synskel configuration file
///
/// Search order:
/// 1. `SYNSKEL_CONFIG_PATH` environment variable
/// 2. Current working directory: `./synskel.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("SYNSKEL_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by SYNSKEL_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|path| path.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "Configuration file '{}' not found in any of these locations:\n{}\n\nSet SYNSKEL_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found, contains invalid TOML, or an override
/// cannot be parsed
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<SkeletonConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: SkeletonConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config)?;
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

/// Environment variable for each override key
const ENV_KEYS: &[(&str, &str)] = &[
    ("SYNSKEL_LUT_DIR", "lut_dir"),
    ("SYNSKEL_TMP_DIR", "tmp_dir"),
    ("SYNSKEL_SYNAPSE_DIR", "synapse_dir"),
    ("SYNSKEL_OUTPUT_DIR", "output_dir"),
    ("SYNSKEL_SEGMENTATION_DIR", "segmentation_dir"),
    ("SYNSKEL_SOMATA_DIR", "somata_dir"),
    ("SYNSKEL_SOMATA_DOWNSAMPLE_RATE", "somata_downsample_rate"),
    ("SYNSKEL_ORACLE", "oracle"),
    ("SYNSKEL_CONTOUR_RULE", "contour_rule"),
    ("SYNSKEL_WORKERS", "workers"),
    ("SYNSKEL_LOG_LEVEL", "log_level"),
];

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `SYNSKEL_LUT_DIR` -> `paths.lut_dir`
/// - `SYNSKEL_TMP_DIR` -> `paths.tmp_dir`
/// - `SYNSKEL_SYNAPSE_DIR` -> `paths.synapse_dir`
/// - `SYNSKEL_OUTPUT_DIR` -> `paths.output_dir`
/// - `SYNSKEL_SEGMENTATION_DIR` -> `paths.segmentation_dir`
/// - `SYNSKEL_SOMATA_DIR` -> `paths.somata_dir`
/// - `SYNSKEL_SOMATA_DOWNSAMPLE_RATE` -> `thinning.somata_downsample_rate`
/// - `SYNSKEL_ORACLE` -> `thinning.oracle`
/// - `SYNSKEL_CONTOUR_RULE` -> `anchors.contour_rule`
/// - `SYNSKEL_WORKERS` -> `parallel.workers`
/// - `SYNSKEL_LOG_LEVEL` -> `logging.log_level`
pub fn apply_environment_overrides(config: &mut SkeletonConfig) -> ConfigResult<()> {
    for (variable, key) in ENV_KEYS {
        if let Ok(value) = env::var(variable) {
            apply_override(config, key, &value)?;
        }
    }
    Ok(())
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"tmp_dir": "/scratch", "workers": "8"}`)
///
/// Unknown keys are ignored so callers can pass their whole argument map.
pub fn apply_cli_overrides(
    config: &mut SkeletonConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    for (_, key) in ENV_KEYS {
        if let Some(value) = cli_args.get(*key) {
            apply_override(config, key, value)?;
        }
    }
    Ok(())
}

fn apply_override(config: &mut SkeletonConfig, key: &str, value: &str) -> ConfigResult<()> {
    match key {
        "lut_dir" => config.paths.lut_dir = PathBuf::from(value),
        "tmp_dir" => config.paths.tmp_dir = PathBuf::from(value),
        "synapse_dir" => config.paths.synapse_dir = PathBuf::from(value),
        "output_dir" => config.paths.output_dir = PathBuf::from(value),
        "segmentation_dir" => config.paths.segmentation_dir = PathBuf::from(value),
        "somata_dir" => {
            config.paths.somata_dir = (!value.is_empty()).then(|| PathBuf::from(value));
        }
        "somata_downsample_rate" => {
            config.thinning.somata_downsample_rate = parse_number(key, value)?;
        }
        "oracle" => config.thinning.oracle = parse_backend(key, value)?,
        "contour_rule" => config.anchors.contour_rule = parse_backend(key, value)?,
        "workers" => config.parallel.workers = parse_number(key, value)?,
        "log_level" => config.logging.log_level = value.to_string(),
        _ => {}
    }
    Ok(())
}

fn parse_number(key: &str, value: &str) -> ConfigResult<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = '{}' is not a count", key, value)))
}

fn parse_backend(key: &str, value: &str) -> ConfigResult<OracleBackend> {
    value
        .parse::<OracleBackend>()
        .map_err(|reason| ConfigError::InvalidValue(format!("{}: {}", key, reason)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var("SYNSKEL_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("SYNSKEL_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("synskel.toml");

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[volume]").unwrap();
        writeln!(file, "volume_size = [64, 128, 128]").unwrap();
        writeln!(file, "block_size = [32, 64, 64]").unwrap();
        writeln!(file, "resolution = [30.0, 6.0, 6.0]").unwrap();
        writeln!(file, "[thinning]").unwrap();
        writeln!(file, "oracle = \"computed\"").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.volume.block_count(), [2, 2, 2]);
        assert_eq!(config.volume.resolution, [30.0, 6.0, 6.0]);
        assert_eq!(config.thinning.oracle, OracleBackend::Computed);
        assert_eq!(config.paths.tmp_dir, PathBuf::from("tmp"));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = SkeletonConfig::default();

        env::set_var("SYNSKEL_TMP_DIR", "/scratch/tmp");
        env::set_var("SYNSKEL_WORKERS", "12");

        let result = apply_environment_overrides(&mut config);

        env::remove_var("SYNSKEL_TMP_DIR");
        env::remove_var("SYNSKEL_WORKERS");

        result.unwrap();
        assert_eq!(config.paths.tmp_dir, PathBuf::from("/scratch/tmp"));
        assert_eq!(config.parallel.workers, 12);
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut config = SkeletonConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("oracle".to_string(), "quantum".to_string());

        assert!(matches!(
            apply_cli_overrides(&mut config, &cli_args),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        // CLI overrides take precedence over environment variables
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("synskel.toml");

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[paths]").unwrap();
        writeln!(file, "output_dir = \"file-output\"").unwrap();
        writeln!(file, "[parallel]").unwrap();
        writeln!(file, "workers = 2").unwrap();

        env::set_var("SYNSKEL_OUTPUT_DIR", "env-output");
        env::set_var("SYNSKEL_WORKERS", "4");

        let mut cli_args = HashMap::new();
        cli_args.insert("output_dir".to_string(), "cli-output".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args));

        env::remove_var("SYNSKEL_OUTPUT_DIR");
        env::remove_var("SYNSKEL_WORKERS");

        // CLI wins for output_dir, env wins for workers (no CLI override)
        let config = config.unwrap();
        assert_eq!(config.paths.output_dir, PathBuf::from("cli-output"));
        assert_eq!(config.parallel.workers, 4);
    }
}

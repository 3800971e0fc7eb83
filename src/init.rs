use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use xdg::BaseDirectories;

/// Default config.toml content
const DEFAULT_CONFIG: &str = r#"[diff]
# Render the whole file instead of only the patch hunks
full_file = false
# In full-file rendering, hide unchanged regions away from any hunk
collapse_unchanged = true
# Lines kept visible around each hunk when collapsing
context_lines = 3

[overlay]
# Height of the comment overlay, restored whenever the file changes
height = 12

[github]
# Environment variable holding a token for the review API.
# When unset, the gh CLI's stored login is used.
token_env = "GH_TOKEN"
"#;

/// Run the init command
pub fn run_init(force: bool) -> Result<()> {
    let base_dirs =
        BaseDirectories::with_prefix("diffpin").context("Failed to get config directory")?;

    init_in(&base_dirs.get_config_home(), force)?;

    println!();
    println!("Initialization complete!");
    Ok(())
}

fn init_in(config_home: &Path, force: bool) -> Result<()> {
    // Create config directory if needed
    if !config_home.exists() {
        println!(
            "Creating configuration directory: {}",
            config_home.display()
        );
        fs::create_dir_all(config_home).context("Failed to create config directory")?;
    }

    let config_path = config_home.join("config.toml");
    write_file_if_needed(&config_path, DEFAULT_CONFIG, force, "config.toml")
}

/// Write a file if it doesn't exist or force is true
fn write_file_if_needed(path: &Path, content: &str, force: bool, name: &str) -> Result<()> {
    if path.exists() && !force {
        println!(
            "Skipping {} (already exists, use --force to overwrite)",
            name
        );
        return Ok(());
    }

    println!("Writing {}...", name);
    fs::write(path, content).with_context(|| format!("Failed to write {}", name))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffpin::config::Config;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_home = temp_dir.path().join("diffpin");

        init_in(&config_home, false).unwrap();

        let config_path = config_home.join("config.toml");
        assert!(config_path.exists(), "config.toml should exist");
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[overlay]"));
    }

    #[test]
    fn test_default_config_matches_builtin_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_init_skips_existing() {
        let temp_dir = TempDir::new().unwrap();
        let config_home = temp_dir.path().join("diffpin");
        fs::create_dir_all(&config_home).unwrap();
        let config_path = config_home.join("config.toml");
        fs::write(&config_path, "custom = true").unwrap();

        init_in(&config_home, false).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert_eq!(content, "custom = true");
    }

    #[test]
    fn test_init_force_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let config_home = temp_dir.path().join("diffpin");
        fs::create_dir_all(&config_home).unwrap();
        let config_path = config_home.join("config.toml");
        fs::write(&config_path, "custom = true").unwrap();

        init_in(&config_home, true).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("token_env"));
        assert!(!content.contains("custom = true"));
    }
}

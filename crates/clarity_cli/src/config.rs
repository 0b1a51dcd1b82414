//! Process-wide configuration resolved once from environment variables
//! (spec §4.15): never read `std::env` again once a `Config` is built,
//! and never stash one behind a `static`/`OnceCell` — it is built in
//! `main` and passed down explicitly.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub artifact_root: PathBuf,
    pub real_model: bool,
    pub rich_mode: bool,
    pub rich_logits_hash: bool,
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

impl Config {
    pub fn from_env() -> Self {
        let cache_dir = std::env::var("CLARITY_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".clarity_cache"));
        let artifact_root = std::env::var("ARTIFACT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("demo_artifacts"));
        let rich_mode = env_flag("CLARITY_RICH_MODE");
        Self {
            cache_dir,
            artifact_root,
            real_model: env_flag("CLARITY_REAL_MODEL"),
            rich_mode,
            rich_logits_hash: rich_mode && env_flag("CLARITY_RICH_LOGITS_HASH"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        std::env::remove_var("CLARITY_CACHE_DIR");
        std::env::remove_var("ARTIFACT_ROOT");
        std::env::remove_var("CLARITY_REAL_MODEL");
        std::env::remove_var("CLARITY_RICH_MODE");
        std::env::remove_var("CLARITY_RICH_LOGITS_HASH");
        let config = Config::from_env();
        assert_eq!(config.artifact_root, PathBuf::from("demo_artifacts"));
        assert!(!config.real_model);
        assert!(!config.rich_mode);
    }

    #[test]
    fn rich_logits_hash_requires_rich_mode() {
        std::env::set_var("CLARITY_RICH_MODE", "0");
        std::env::set_var("CLARITY_RICH_LOGITS_HASH", "1");
        let config = Config::from_env();
        assert!(!config.rich_logits_hash);
        std::env::remove_var("CLARITY_RICH_MODE");
        std::env::remove_var("CLARITY_RICH_LOGITS_HASH");
    }
}

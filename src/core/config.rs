use std::env;
use std::path::{Path, PathBuf};

/// Models offered to clients when `LOCALAI_MODELS` is not set.
pub const DEFAULT_MODELS: [&str; 7] = [
    "deepseek-r1:14b",
    "deepseek-r1:8b",
    "qwen2.5:latest",
    "codellama:13b",
    "deepseek-r1:7b",
    "deepseek-r1:1.5b",
    "llama3.2:latest",
];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub ollama_path: String,
    pub available_models: Vec<String>,
    pub default_model: String,
    pub web_ui_path: String,
}

impl AppConfig {
    pub fn is_available(&self, model: &str) -> bool {
        self.available_models.iter().any(|m| m == model)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let ollama_path = env::var("LOCALAI_OLLAMA_PATH").unwrap_or_else(|_| {
            find_on_path("ollama")
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "/usr/local/bin/ollama".to_string())
        });
        let available_models = env::var("LOCALAI_MODELS")
            .map(|models| parse_model_list(&models))
            .ok()
            .filter(|models| !models.is_empty())
            .unwrap_or_else(|| DEFAULT_MODELS.iter().map(|m| m.to_string()).collect());
        let default_model = env::var("LOCALAI_DEFAULT_MODEL")
            .unwrap_or_else(|_| "deepseek-r1:14b".to_string());
        let web_ui_path =
            env::var("LOCALAI_WEB_UI_PATH").unwrap_or_else(|_| "./web-ui/src".to_string());

        Self {
            ollama_path,
            available_models,
            default_model,
            web_ui_path,
        }
    }
}

fn parse_model_list(models: &str) -> Vec<String> {
    models
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}

/// Look up an executable by name in each directory of `PATH`.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_list() {
        assert_eq!(
            parse_model_list(" llama3.2:latest, qwen2.5:latest ,,"),
            vec!["llama3.2:latest".to_string(), "qwen2.5:latest".to_string()]
        );
        assert!(parse_model_list(" , ").is_empty());
    }

    #[test]
    fn test_is_available() {
        let config = AppConfig {
            ollama_path: "ollama".to_string(),
            available_models: vec!["m1".to_string()],
            default_model: "m1".to_string(),
            web_ui_path: "./web-ui/src".to_string(),
        };
        assert!(config.is_available("m1"));
        assert!(!config.is_available("m2"));
    }

    #[test]
    fn test_find_on_path_missing_binary() {
        assert!(find_on_path("definitely-not-a-real-binary-name").is_none());
    }
}

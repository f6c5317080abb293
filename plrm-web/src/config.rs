//! Configuração do servidor, lida de um arquivo TOML opcional.
//!
//! ```toml
//! bind = "0.0.0.0:3000"
//! suite_name = "producao"
//!
//! [suite]
//! verbosity = "verbose"
//! mode = { definitional = true }
//!
//! [default_learner]
//! type = "exponentiated_gradient"
//! eta = 0.1
//! ```

use std::path::Path;

use plrm_core::{LearnerSpec, PlrmError, SuiteConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Variável de ambiente com o caminho do arquivo de configuração.
pub const CONFIG_ENV: &str = "PLRM_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("não foi possível ler a configuração: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuração TOML inválida: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("learner padrão inválido: {0}")]
    Learner(#[from] PlrmError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub suite_name: String,
    pub suite: SuiteConfig,
    /// Learner criado quando `POST /learners` não informa tipo nem parâmetros.
    pub default_learner: LearnerSpec,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            suite_name: "plrm".to_string(),
            suite: SuiteConfig::default(),
            default_learner: LearnerSpec::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.default_learner.validate(false)?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Lê o arquivo apontado por `PLRM_CONFIG`; sem a variável, usa os padrões.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plrm_core::{EgParams, Verbosity};

    #[test]
    fn test_empty_file_uses_defaults() {
        assert_eq!(ServerConfig::from_toml_str("").unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_full_file() {
        let text = r#"
            bind = "127.0.0.1:8080"
            suite_name = "teste"

            [suite]
            verbosity = "verbose"
            mode = { definitional = true }

            [default_learner]
            type = "exponentiated_gradient"
            eta = 0.1
        "#;
        let config = ServerConfig::from_toml_str(text).unwrap();
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.suite.verbosity, Verbosity::Verbose);
        assert!(config.suite.mode.definitional);
        assert_eq!(
            config.default_learner,
            LearnerSpec::ExponentiatedGradient(EgParams { eta: 0.1, u: 10.0 })
        );
    }

    #[test]
    fn test_invalid_default_learner() {
        let text = "[default_learner]\ntype = \"truncated_gradient\"\neta = -1.0\n";
        assert!(matches!(
            ServerConfig::from_toml_str(text),
            Err(ConfigError::Learner(_))
        ));
    }
}

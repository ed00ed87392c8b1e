//! Configuração de execução do firmware no host via TOML.
//!
//! Os metadados do logger (nome, períodos) ficam no store interno; aqui ficam
//! só os parâmetros do ambiente: diretórios, servidor e tick.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Erros ao gravar a configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro ao serializar configuração: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Erro ao gravar configuração: {0}")]
    Io(#[from] std::io::Error),
}

/// Armazenamento interno (metadados) e externo (medições).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Raiz do store interno
    pub internal_dir: PathBuf,
    /// Arquivo do registro de metadados
    pub metadata_file: String,
    /// Raiz dos arquivos de medição
    pub external_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            internal_dir: PathBuf::from("data/internal"),
            metadata_file: "metadata.txt".into(),
            external_dir: PathBuf::from("data/external"),
        }
    }
}

/// Cliente HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub server_url: String,
    /// Prazo de cada POST (ms)
    pub timeout_ms: u64,
    pub enabled: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080/api/hello".into(),
            timeout_ms: 5000,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Duração de um tick (ms)
    pub tick_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_ms: 1 }
    }
}

/// Configuração raiz do firmware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareConfig {
    pub storage: StorageConfig,
    pub network: NetworkConfig,
    pub scheduler: SchedulerConfig,
}

impl FirmwareConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<FirmwareConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        FirmwareConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.storage.metadata_file.trim().is_empty() {
            errors.push("Arquivo de metadados não pode ser vazio".into());
        }
        if self.storage.internal_dir == self.storage.external_dir {
            errors.push("Armazenamento interno e externo devem ser diretórios distintos".into());
        }
        if self.network.enabled && !self.network.server_url.starts_with("http://") {
            errors.push(format!(
                "URL do servidor inválida: {} (apenas http://)",
                self.network.server_url
            ));
        }
        if self.network.timeout_ms == 0 {
            errors.push("Timeout de rede não pode ser 0".into());
        }
        if self.scheduler.tick_ms == 0 || self.scheduler.tick_ms > 1000 {
            errors.push(format!(
                "Tick inválido: {} ms (1–1000)",
                self.scheduler.tick_ms
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = FirmwareConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn roundtrip_toml() {
        let config = FirmwareConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: FirmwareConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[network]
timeout_ms = 250
"#;
        let config: FirmwareConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.network.timeout_ms, 250);
        // Outros campos devem ter valor padrão
        assert!(config.network.enabled);
        assert_eq!(config.scheduler.tick_ms, 1);
        assert_eq!(config.storage.metadata_file, "metadata.txt");
    }

    #[test]
    fn invalid_values_are_listed() {
        let mut config = FirmwareConfig::default();
        config.scheduler.tick_ms = 0;
        config.network.server_url = "https://example.com".into();
        config.storage.external_dir = config.storage.internal_dir.clone();
        assert_eq!(config.validate().len(), 3);
    }

    #[test]
    fn disabled_network_skips_url_check() {
        let mut config = FirmwareConfig::default();
        config.network.enabled = false;
        config.network.server_url = String::new();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("datalogger-config-inexistente.toml");
        let _ = std::fs::remove_file(&path);
        assert_eq!(FirmwareConfig::load(&path), FirmwareConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("datalogger-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let mut config = FirmwareConfig::default();
        config.network.server_url = "http://10.0.0.2:9000/ingest".into();
        config.save(&path).unwrap();

        assert_eq!(FirmwareConfig::load(&path), config);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

//! Configuration du binaire QafRadio.
//!
//! Structures typées avec valeurs par défaut : le reste du binaire peut
//! compter sur une forme stable quelle que soit la provenance des données
//! (fichier YAML, défauts embarqués, tests).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use qafsink::{RoomKind, RoomTarget};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Chemin de configuration par défaut, relatif au répertoire de travail.
const DEFAULT_CONFIG_PATH: &str = "qafradio.yaml";

/// Bloc de configuration racine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    #[serde(default = "RadioConfig::default_audio_dir")]
    pub audio_dir: PathBuf,
    #[serde(default = "RadioConfig::default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "RadioConfig::default_reciter")]
    pub default_reciter: String,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default = "RadioConfig::default_autosave_seconds")]
    pub autosave_seconds: u64,
}

impl RadioConfig {
    fn default_audio_dir() -> PathBuf {
        PathBuf::from("/var/lib/qafradio/audio")
    }

    fn default_state_file() -> PathBuf {
        PathBuf::from("/var/lib/qafradio/state.json")
    }

    fn default_reciter() -> String {
        "Saad Al Ghamdi".to_string()
    }

    const fn default_autosave_seconds() -> u64 {
        qafstation::constants::AUTOSAVE_INTERVAL.as_secs()
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_seconds)
    }

    /// Charge la configuration depuis `QAFRADIO_CONFIG`, ou le chemin par
    /// défaut si la variable n'est pas posée.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("QAFRADIO_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    /// Charge un fichier YAML précis. Un fichier absent donne les valeurs
    /// par défaut ; un fichier illisible ou invalide est une erreur.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let config: Self = serde_yaml::from_str(&raw)?;
                info!(config_file = %path.display(), "Loaded config file");
                Ok(config)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(config_file = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            audio_dir: Self::default_audio_dir(),
            state_file: Self::default_state_file(),
            default_reciter: Self::default_reciter(),
            gateway: GatewayConfig::default(),
            http: HttpConfig::default(),
            media: MediaConfig::default(),
            autosave_seconds: Self::default_autosave_seconds(),
        }
    }
}

/// Passerelle audio à rejoindre.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "GatewayConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "GatewayConfig::default_room")]
    pub room: String,
    #[serde(default = "GatewayConfig::default_kind")]
    pub kind: RoomKind,
}

impl GatewayConfig {
    fn default_base_url() -> String {
        "http://127.0.0.1:9200".to_string()
    }

    fn default_room() -> String {
        "main-hall".to_string()
    }

    const fn default_kind() -> RoomKind {
        RoomKind::Broadcast
    }

    /// Cible complète telle qu'attendue par le sink.
    pub fn target(&self) -> RoomTarget {
        RoomTarget {
            base_url: self.base_url.clone(),
            room: self.room.clone(),
            kind: self.kind,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            room: Self::default_room(),
            kind: Self::default_kind(),
        }
    }
}

/// Interface HTTP locale (API REST + fichiers média).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "HttpConfig::default_bind")]
    pub bind: String,
    #[serde(default = "HttpConfig::default_port")]
    pub port: u16,
}

impl HttpConfig {
    fn default_bind() -> String {
        "0.0.0.0".to_string()
    }

    const fn default_port() -> u16 {
        9170
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            port: Self::default_port(),
        }
    }
}

/// Espace d'URL média vu par la passerelle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "MediaConfig::default_public_url")]
    pub public_url: String,
}

impl MediaConfig {
    fn default_public_url() -> String {
        "http://127.0.0.1:9170/media".to_string()
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            public_url: Self::default_public_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_complete() {
        let config = RadioConfig::default();

        assert_eq!(config.default_reciter, "Saad Al Ghamdi");
        assert_eq!(config.http.port, 9170);
        assert_eq!(config.http.listen_addr(), "0.0.0.0:9170");
        assert_eq!(config.gateway.kind, RoomKind::Broadcast);
        assert_eq!(config.autosave_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_yaml_fills_missing_fields() {
        let raw = r#"
default_reciter: "Mishary Alafasy"
gateway:
  room: quiet-corner
"#;
        let config: RadioConfig = serde_yaml::from_str(raw).unwrap();

        assert_eq!(config.default_reciter, "Mishary Alafasy");
        assert_eq!(config.gateway.room, "quiet-corner");
        assert_eq!(config.gateway.base_url, "http://127.0.0.1:9200");
        assert_eq!(config.gateway.kind, RoomKind::Broadcast);
        assert_eq!(config.state_file, PathBuf::from("/var/lib/qafradio/state.json"));
    }

    #[test]
    fn test_full_yaml_parses() {
        let raw = r#"
audio_dir: /srv/audio
state_file: /srv/state.json
default_reciter: "Abdul Basit"
gateway:
  base_url: http://gateway.local:9200
  room: prayer-hall
  kind: voice
http:
  bind: 127.0.0.1
  port: 8085
media:
  public_url: http://radio.local:8085/media
autosave_seconds: 120
"#;
        let config: RadioConfig = serde_yaml::from_str(raw).unwrap();

        assert_eq!(config.audio_dir, PathBuf::from("/srv/audio"));
        assert_eq!(config.gateway.kind, RoomKind::Voice);
        assert_eq!(config.http.listen_addr(), "127.0.0.1:8085");
        assert_eq!(config.media.public_url, "http://radio.local:8085/media");
        assert_eq!(config.autosave_interval(), Duration::from_secs(120));

        let target = config.gateway.target();
        assert_eq!(target.base_url, "http://gateway.local:9200");
        assert_eq!(target.room, "prayer-hall");
        assert_eq!(target.kind, RoomKind::Voice);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();

        let config = RadioConfig::load_from(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.default_reciter, "Saad Al Ghamdi");
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "http:\n  port: not-a-number\n").unwrap();

        assert!(RadioConfig::load_from(&path).is_err());
    }
}

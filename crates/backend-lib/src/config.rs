// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::error::ContestError;

/// Application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Directory downloaded track audio is served from
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Static client assets
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
    /// First-round bracket size; must be positive and even
    #[serde(default = "default_bracket_size")]
    pub bracket_size: usize,
    /// Votes handed to every known user when a round opens
    #[serde(default = "default_vote_allotment")]
    pub vote_allotment: u32,
    /// Media source settings
    #[serde(default)]
    pub media: MediaSettings,
    /// OAuth provider settings
    #[serde(default)]
    pub oauth: OAuthSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    /// API client id for the media source
    #[serde(default)]
    pub client_id: String,
    /// Upper bound on any single lookup or download request
    #[serde(default = "default_media_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthSettings {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub callback_url: String,
}

fn default_bind_addr() -> SocketAddr {
    "127.0.0.1:3000".parse().unwrap()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_bracket_size() -> usize {
    8
}

fn default_vote_allotment() -> u32 {
    10
}

fn default_media_timeout_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind_addr: default_bind_addr(),
            upload_dir: default_upload_dir(),
            public_dir: default_public_dir(),
            bracket_size: default_bracket_size(),
            vote_allotment: default_vote_allotment(),
            media: MediaSettings::default(),
            oauth: OAuthSettings::default(),
        }
    }
}

impl Default for MediaSettings {
    fn default() -> Self {
        MediaSettings {
            client_id: String::new(),
            timeout_secs: default_media_timeout_secs(),
        }
    }
}

impl Settings {
    /// Load settings from the default config file plus environment.
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    /// Load settings from a specific TOML file, overridden by
    /// `SOUNDCLASH_`-prefixed environment variables.
    pub fn load_from(path: &str) -> Result<Self> {
        let settings: Settings = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("SOUNDCLASH_").split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations the bracket generator cannot work with.
    pub fn validate(&self) -> Result<(), ContestError> {
        if self.bracket_size == 0 || self.bracket_size % 2 != 0 {
            return Err(ContestError::Internal(format!(
                "bracket_size must be a positive even number, got {}",
                self.bracket_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.bracket_size, 8);
        assert_eq!(settings.vote_allotment, 10);
        assert_eq!(settings.media.timeout_secs, 30);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_odd_bracket_size() {
        let settings = Settings {
            bracket_size: 7,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            bracket_size: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "soundclash.toml",
                r#"
                    bracket_size = 4
                    vote_allotment = 5

                    [media]
                    client_id = "abc"
                "#,
            )?;
            let settings = Settings::load_from("soundclash.toml").unwrap();
            assert_eq!(settings.bracket_size, 4);
            assert_eq!(settings.vote_allotment, 5);
            assert_eq!(settings.media.client_id, "abc");
            // untouched fields keep their defaults
            assert_eq!(settings.upload_dir, PathBuf::from("uploads"));
            Ok(())
        });
    }
}

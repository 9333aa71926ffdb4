//! Persisted screensaver settings.
//!
//! The settings file is read once at startup into [`Settings`] and written back
//! only at explicit save points. Durations accept either a number of seconds or
//! a human-readable string (`"5m"`, `"50ms"`).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use shadertoy::{join_identifiers, parse_identifiers, ShaderDocument, ShaderId};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to access settings file at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Comma separated shader identifiers, in fetch order.
    pub shader_ids: String,
    pub api_key: String,
    /// Give every display its own shader instead of mirroring one.
    pub separate_screens: bool,
    /// Re-shuffle shaders every `rotate_interval`.
    pub auto_rotate: bool,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub rotate_interval: Duration,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub frame_interval: Duration,
    /// Last successfully fetched and validated documents.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<ShaderDocument>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shader_ids: String::new(),
            api_key: String::new(),
            separate_screens: false,
            auto_rotate: false,
            rotate_interval: default_rotate_interval(),
            frame_interval: default_frame_interval(),
            documents: Vec::new(),
        }
    }
}

pub fn default_rotate_interval() -> Duration {
    Duration::from_secs(300)
}

/// 20 frames per second.
pub fn default_frame_interval() -> Duration {
    Duration::from_millis(50)
}

impl Settings {
    pub fn from_toml_str(input: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(input)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file; using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn persist(&self, path: &Path) -> Result<(), SettingsError> {
        self.validate()?;
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let serialized = self.to_toml_string()?;
        fs::write(path, serialized).map_err(io_err)?;
        tracing::debug!(
            path = %path.display(),
            documents = self.documents.len(),
            "persisted settings"
        );
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.rotate_interval.is_zero() {
            return Err(SettingsError::Invalid(
                "rotate_interval must be greater than zero".into(),
            ));
        }
        if self.frame_interval.is_zero() {
            return Err(SettingsError::Invalid(
                "frame_interval must be greater than zero".into(),
            ));
        }
        if let Some(doc) = self.documents.iter().find(|doc| doc.error().is_some()) {
            return Err(SettingsError::Invalid(format!(
                "cached shader '{}' carries a repository error",
                doc.id
            )));
        }
        Ok(())
    }

    pub fn identifiers(&self) -> Vec<ShaderId> {
        parse_identifiers(&self.shader_ids)
    }

    pub fn set_identifiers(&mut self, ids: &[ShaderId]) {
        self.shader_ids = join_identifiers(ids);
    }

    pub fn api_key(&self) -> Option<&str> {
        let key = self.api_key.trim();
        (!key.is_empty()).then_some(key)
    }

    /// API key with everything but the last four characters hidden.
    pub fn masked_api_key(&self) -> String {
        match self.api_key() {
            None => "(not set)".into(),
            Some(key) => {
                let visible: String = key
                    .chars()
                    .rev()
                    .take(4)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                let hidden = key.chars().count() - visible.chars().count();
                format!("{}{visible}", "*".repeat(hidden))
            }
        }
    }

    pub fn replace_documents(&mut self, documents: Vec<ShaderDocument>) {
        self.documents = documents;
    }
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            parse_duration(v).map_err(E::custom)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Parses `"300"`, `"5m"`, `"50ms"` and friends.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if let Ok(seconds) = trimmed.parse::<f64>() {
        if seconds.is_nan() || seconds.is_sign_negative() {
            return Err(format!("invalid duration '{value}': must be non-negative"));
        }
        return Duration::try_from_secs_f64(seconds)
            .map_err(|err| format!("invalid duration '{value}': {err}"));
    }
    humantime::parse_duration(trimmed).map_err(|err| format!("invalid duration '{value}': {err}"))
}

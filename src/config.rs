use serde::Deserialize;

/// Construction settings for [`CodecRegistry::with_config`](crate::CodecRegistry::with_config).
///
/// ```toml
/// [form]
/// comma_separated = true
///
/// [json]
/// pretty = false
/// use_proto_names = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub form: FormConfig,
    pub json: JsonConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    /// comma-join and comma-split every scalar sequence
    pub comma_separated: bool,
    pub use_proto_names: bool,
    pub use_enum_numbers: bool,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            comma_separated: false,
            use_proto_names: true,
            use_enum_numbers: true,
        }
    }
}

/// JSON output. The naming options only shape structured messages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JsonConfig {
    pub pretty: bool,
    pub use_proto_names: bool,
    pub use_enum_numbers: bool,
}

impl Default for JsonConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            use_proto_names: true,
            use_enum_numbers: true,
        }
    }
}

impl EncodingConfig {
    pub fn from_json(input: &str) -> anyhow::Result<Self> {
        serde_json::from_str(input).map_err(|e| anyhow::anyhow!("parse encoding config: {}", e))
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(input: &str) -> anyhow::Result<Self> {
        toml::from_str(input).map_err(|e| anyhow::anyhow!("parse encoding config: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EncodingConfig::from_json("{}").unwrap();
        assert_eq!(config, EncodingConfig::default());
        assert!(!config.form.comma_separated);
        assert!(config.form.use_proto_names);
        assert!(config.form.use_enum_numbers);
        assert!(!config.json.pretty);
        assert!(config.json.use_proto_names);
        assert!(config.json.use_enum_numbers);
    }

    #[test]
    fn test_from_json() {
        let config = EncodingConfig::from_json(r#"{"form":{"use_enum_numbers":false}}"#).unwrap();
        assert!(!config.form.use_enum_numbers);
        assert!(config.form.use_proto_names);

        let err = EncodingConfig::from_json(r#"{"form":1}"#).unwrap_err();
        assert!(err.to_string().starts_with("parse encoding config"));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_from_toml() {
        let config = EncodingConfig::from_toml(
            r#"
            [form]
            comma_separated = true

            [json]
            pretty = true
            use_enum_numbers = false
            "#,
        )
        .unwrap();
        assert!(config.form.comma_separated);
        assert!(config.json.pretty);
        assert!(!config.json.use_enum_numbers);
        assert!(config.json.use_proto_names);
    }
}

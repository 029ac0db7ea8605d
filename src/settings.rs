use config::{Config, ConfigError};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub explorer: ExplorerSettings,
    #[serde(default)]
    pub azure: AzureSettings,
}

/// Which manifest to read when deriving an image's creation time
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestReference {
    /// Always read `manifests/latest`, whatever tag is being described
    #[default]
    Latest,
    /// Read the manifest of the tag itself
    Tag,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistrySettings {
    /// URL scheme used to reach registry login servers (default: "https")
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Manifest reference used for image timestamps (default: latest)
    #[serde(default)]
    pub manifest_reference: ManifestReference,

    /// Maximum number of manifest requests in flight per repository expansion (default: 4)
    #[serde(default = "default_concurrency")]
    pub manifest_concurrency: usize,

    /// Timeout for every registry data-plane request in seconds (default: 30)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            manifest_reference: ManifestReference::default(),
            manifest_concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExplorerSettings {
    /// Label of the root node (default: "Azure")
    #[serde(default = "default_root_label")]
    pub root_label: String,

    /// Maximum number of subscriptions listed concurrently during root expansion (default: 4)
    #[serde(default = "default_concurrency")]
    pub subscription_concurrency: usize,

    /// Replace a degraded expansion's empty child list with a single error node
    #[serde(default)]
    pub show_error_nodes: bool,
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            root_label: default_root_label(),
            subscription_concurrency: default_concurrency(),
            show_error_nodes: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AzureSettings {
    #[serde(default)]
    pub environment: AzureEnvironment,

    /// API version used for Microsoft.ContainerRegistry management calls
    #[serde(default = "default_management_api_version")]
    pub management_api_version: String,

    /// Signed-in directory sessions
    #[serde(default)]
    pub sessions: Vec<SessionSettings>,

    /// Subscriptions shown in the explorer
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionSettings>,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            environment: AzureEnvironment::default(),
            management_api_version: default_management_api_version(),
            sessions: Vec::new(),
            subscriptions: Vec::new(),
        }
    }
}

/// Directory and management endpoints of a cloud environment
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AzureEnvironment {
    #[serde(default = "default_directory_endpoint")]
    pub directory_endpoint: String,
    #[serde(default = "default_directory_resource_id")]
    pub directory_resource_id: String,
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,
}

impl Default for AzureEnvironment {
    fn default() -> Self {
        Self {
            directory_endpoint: default_directory_endpoint(),
            directory_resource_id: default_directory_resource_id(),
            management_endpoint: default_management_endpoint(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionSettings {
    pub tenant_id: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    /// Directory refresh token, usually injected as `${AZURE_REFRESH_TOKEN}`
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SubscriptionSettings {
    pub subscription_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub tenant_id: String,
    #[serde(default = "default_subscription_state")]
    pub state: String,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    30
}

fn default_root_label() -> String {
    "Azure".to_string()
}

fn default_management_api_version() -> String {
    "2017-10-01".to_string()
}

fn default_directory_endpoint() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_directory_resource_id() -> String {
    "https://management.core.windows.net/".to_string()
}

fn default_management_endpoint() -> String {
    "https://management.azure.com".to_string()
}

fn default_client_id() -> String {
    // Public client id of the Azure CLI
    "04b07795-8ddb-461a-bbee-02f9e1bf7b46".to_string()
}

fn default_subscription_state() -> String {
    "Enabled".to_string()
}

impl Settings {
    /// Substitute environment variables in a string value
    /// Replaces ${VAR_NAME} or ${VAR_NAME:-default} with environment variable values
    fn substitute_env_vars_in_string(s: &str) -> String {
        let re = match regex::Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}") {
            Ok(re) => re,
            Err(_) => return s.to_string(),
        };

        re.replace_all(s, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match env::var(var_name) {
                Ok(val) => val,
                Err(_) => default_value.unwrap_or("").to_string(),
            }
        })
        .to_string()
    }

    /// Convert a config::Value to a serde_json::Value, performing environment variable substitution
    fn config_value_to_json(value: &config::Value) -> serde_json::Value {
        use config::ValueKind;

        match &value.kind {
            ValueKind::Nil => serde_json::Value::Null,
            ValueKind::Boolean(b) => serde_json::Value::Bool(*b),
            ValueKind::I64(i) => serde_json::Value::Number((*i).into()),
            ValueKind::I128(i) => serde_json::Value::Number((*i as i64).into()),
            ValueKind::U64(u) => serde_json::Value::Number((*u).into()),
            ValueKind::U128(u) => serde_json::Value::Number((*u as u64).into()),
            ValueKind::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueKind::String(s) => {
                serde_json::Value::String(Self::substitute_env_vars_in_string(s))
            }
            ValueKind::Table(table) => {
                let mut map = serde_json::Map::new();
                for (k, v) in table.iter() {
                    map.insert(k.clone(), Self::config_value_to_json(v));
                }
                serde_json::Value::Object(map)
            }
            ValueKind::Array(arr) => {
                let vec: Vec<serde_json::Value> =
                    arr.iter().map(Self::config_value_to_json).collect();
                serde_json::Value::Array(vec)
            }
        }
    }

    /// Try to add a config file with multiple extension attempts (.toml, .yaml, .yml)
    /// Returns Ok(true) if a file was loaded, Ok(false) if none was found
    fn try_add_config_file(
        builder: &mut config::ConfigBuilder<config::builder::DefaultState>,
        config_dir: &str,
        name: &str,
    ) -> bool {
        let extensions = ["toml", "yaml", "yml"];

        for ext in extensions {
            let path = format!("{}/{}.{}", config_dir, name, ext);
            if std::path::Path::new(&path).exists() {
                tracing::info!("Loading config file: {}", path);
                *builder = builder
                    .clone()
                    .add_source(config::File::with_name(&format!("{}/{}", config_dir, name)));
                return true;
            }
        }

        tracing::debug!(
            "Optional config file not found: {}/{}.{{toml,yaml,yml}}",
            config_dir,
            name
        );
        false
    }

    /// Load settings from `ACR_EXPLORER_CONFIG_DIR` (default "config") using
    /// the run mode in `ACR_EXPLORER_CONFIG_RUN_MODE` (default "development")
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode =
            env::var("ACR_EXPLORER_CONFIG_RUN_MODE").unwrap_or_else(|_| "development".into());
        let config_dir = env::var("ACR_EXPLORER_CONFIG_DIR").unwrap_or_else(|_| "config".into());
        Self::load(&config_dir, &run_mode)
    }

    /// Load `default`, `{run_mode}` and `local` from `config_dir`, later files
    /// overriding earlier ones, then apply `ACR_EXPLORER__*` environment overrides
    pub fn load(config_dir: &str, run_mode: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for name in ["default", run_mode, "local"] {
            Self::try_add_config_file(&mut builder, config_dir, name);
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ACR_EXPLORER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_config(builder.build()?)
    }

    /// Build settings from an inline TOML document
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(config::File::from_str(document, config::FileFormat::Toml))
            .build()?;
        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        let root_value = config
            .cache
            .into_table()
            .map_err(|e| ConfigError::Message(format!("Failed to get config table: {}", e)))?;

        let mut json_map = serde_json::Map::new();
        for (k, v) in root_value.iter() {
            json_map.insert(k.clone(), Self::config_value_to_json(v));
        }
        let json_value = serde_json::Value::Object(json_map);

        let mut unused_fields = Vec::new();
        let settings: Settings = serde_ignored::deserialize(json_value, |path| {
            unused_fields.push(path.to_string());
        })
        .map_err(|e| ConfigError::Message(format!("Failed to deserialize settings: {}", e)))?;

        for field in &unused_fields {
            tracing::warn!("Unknown configuration field in explorer config: {}", field);
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.registry.scheme.as_str(), "http" | "https") {
            return Err(ConfigError::Message(format!(
                "registry.scheme must be 'http' or 'https', got '{}'",
                self.registry.scheme
            )));
        }
        if self.registry.manifest_concurrency == 0 {
            return Err(ConfigError::Message(
                "registry.manifest_concurrency must be at least 1".to_string(),
            ));
        }
        if self.explorer.subscription_concurrency == 0 {
            return Err(ConfigError::Message(
                "explorer.subscription_concurrency must be at least 1".to_string(),
            ));
        }
        for session in &self.azure.sessions {
            if session.refresh_token.is_empty() {
                return Err(ConfigError::Message(format!(
                    "Session for tenant '{}' has an empty refresh_token",
                    session.tenant_id
                )));
            }
        }
        Ok(())
    }
}

use crate::gateways::Provider;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum SignType {
    #[default]
    Md5,
    HmacSha256,
}

impl SignType {
    pub fn wire_name(self) -> &'static str {
        match self {
            SignType::Md5 => "MD5",
            SignType::HmacSha256 => "HMAC-SHA256",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "MD5" => Some(SignType::Md5),
            "HMAC-SHA256" | "HMAC_SHA256" => Some(SignType::HmacSha256),
            _ => None,
        }
    }
}

/// Legacy XML protocol (WeChat Pay API v2).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WechatV2Config {
    pub app_id: String,
    pub mch_id: String,
    /// Shared signing secret.
    pub key: String,
    pub notify_url: String,
    /// Client certificate used for refunds.
    #[serde(default)]
    pub cert_path: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
    #[serde(default)]
    pub sign_type: SignType,
    #[serde(default)]
    pub sandbox: bool,
    /// Overrides the processor host, mostly for proxies and tests.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// WeChat Pay API v3, driven through the vendor client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WechatConfig {
    pub app_id: String,
    pub mch_id: String,
    pub serial_no: String,
    #[serde(default)]
    pub private_key_path: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    pub api_v3_key: String,
    pub notify_url: String,
    #[serde(default)]
    pub platform_cert_path: Option<String>,
    #[serde(default)]
    pub sandbox: bool,
}

/// Alipay open platform, driven through the vendor client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AlipayConfig {
    pub app_id: String,
    #[serde(default)]
    pub private_key_path: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub alipay_public_key_path: Option<String>,
    #[serde(default)]
    pub alipay_public_key: Option<String>,
    pub notify_url: String,
    #[serde(default)]
    pub return_url: Option<String>,
    #[serde(default)]
    pub sandbox: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderConfig {
    WechatV2(WechatV2Config),
    Wechat(WechatConfig),
    Alipay(AlipayConfig),
}

impl ProviderConfig {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderConfig::WechatV2(_) => Provider::WechatV2,
            ProviderConfig::Wechat(_) => Provider::Wechat,
            ProviderConfig::Alipay(_) => Provider::Alipay,
        }
    }

    /// Structurally identical configs share a fingerprint.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Supplies the default configuration of each provider.
pub trait ConfigSource: Send + Sync {
    fn provider_config(&self, provider: Provider) -> Option<ProviderConfig>;
}

/// Fixed set of configurations, handy for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    configs: HashMap<Provider, ProviderConfig>,
}

impl StaticConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, config: ProviderConfig) -> Self {
        self.configs.insert(config.provider(), config);
        self
    }
}

impl ConfigSource for StaticConfigSource {
    fn provider_config(&self, provider: Provider) -> Option<ProviderConfig> {
        self.configs.get(&provider).cloned()
    }
}

/// Reads provider credentials from the environment.
///
/// A provider for which no variable is set has no default configuration.
/// Relative `*_PATH` values are resolved against `PAYMENT_PROJECT_ROOT`, or the
/// working directory when that is unset.
#[derive(Debug, Clone)]
pub struct EnvConfigSource {
    pub project_root: PathBuf,
    configs: HashMap<Provider, ProviderConfig>,
}

impl EnvConfigSource {
    pub fn from_env() -> Self {
        let project_root = std::env::var("PAYMENT_PROJECT_ROOT")
            .map(PathBuf::from)
            .or_else(|_| std::env::current_dir())
            .unwrap_or_else(|_| PathBuf::from("."));
        Self::from_lookup(project_root, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(project_root: PathBuf, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = EnvVars {
            lookup: &lookup,
            root: &project_root,
        };
        let mut configs = HashMap::new();

        if vars.any_set("WECHAT_V2_") {
            configs.insert(
                Provider::WechatV2,
                ProviderConfig::WechatV2(WechatV2Config {
                    app_id: vars.string("WECHAT_V2_APP_ID"),
                    mch_id: vars.string("WECHAT_V2_MCH_ID"),
                    key: vars.string("WECHAT_V2_KEY"),
                    notify_url: vars.string("WECHAT_V2_NOTIFY_URL"),
                    cert_path: vars.path("WECHAT_V2_CERT_PATH"),
                    key_path: vars.path("WECHAT_V2_KEY_PATH"),
                    sign_type: vars
                        .optional("WECHAT_V2_SIGN_TYPE")
                        .and_then(|s| SignType::parse(&s))
                        .unwrap_or_default(),
                    sandbox: vars.flag("WECHAT_V2_SANDBOX"),
                    base_url: vars.optional("WECHAT_V2_BASE_URL"),
                }),
            );
        }

        if vars.any_set("WECHAT_V3_") {
            configs.insert(
                Provider::Wechat,
                ProviderConfig::Wechat(WechatConfig {
                    app_id: vars.string("WECHAT_V3_APP_ID"),
                    mch_id: vars.string("WECHAT_V3_MCH_ID"),
                    serial_no: vars.string("WECHAT_V3_SERIAL_NO"),
                    private_key_path: vars.path("WECHAT_V3_PRIVATE_KEY_PATH"),
                    private_key: vars.optional("WECHAT_V3_PRIVATE_KEY"),
                    api_v3_key: vars.string("WECHAT_V3_API_KEY"),
                    notify_url: vars.string("WECHAT_V3_NOTIFY_URL"),
                    platform_cert_path: vars.path("WECHAT_V3_PLATFORM_CERT_PATH"),
                    sandbox: vars.flag("WECHAT_V3_SANDBOX"),
                }),
            );
        }

        if vars.any_set("ALIPAY_") {
            configs.insert(
                Provider::Alipay,
                ProviderConfig::Alipay(AlipayConfig {
                    app_id: vars.string("ALIPAY_APP_ID"),
                    private_key_path: vars.path("ALIPAY_PRIVATE_KEY_PATH"),
                    private_key: vars.optional("ALIPAY_PRIVATE_KEY"),
                    alipay_public_key_path: vars.path("ALIPAY_PUBLIC_KEY_PATH"),
                    alipay_public_key: vars.optional("ALIPAY_PUBLIC_KEY"),
                    notify_url: vars.string("ALIPAY_NOTIFY_URL"),
                    return_url: vars.optional("ALIPAY_RETURN_URL"),
                    sandbox: vars.flag("ALIPAY_SANDBOX"),
                }),
            );
        }

        Self {
            project_root,
            configs,
        }
    }
}

impl ConfigSource for EnvConfigSource {
    fn provider_config(&self, provider: Provider) -> Option<ProviderConfig> {
        self.configs.get(&provider).cloned()
    }
}

struct EnvVars<'a, F> {
    lookup: &'a F,
    root: &'a Path,
}

const KNOWN_SUFFIXES: &[&str] = &[
    "APP_ID",
    "MCH_ID",
    "KEY",
    "API_KEY",
    "SERIAL_NO",
    "NOTIFY_URL",
    "CERT_PATH",
    "KEY_PATH",
    "PRIVATE_KEY",
    "PRIVATE_KEY_PATH",
    "PUBLIC_KEY",
    "PUBLIC_KEY_PATH",
    "PLATFORM_CERT_PATH",
];

impl<'a, F> EnvVars<'a, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, name: &str) -> String {
        self.optional(name).unwrap_or_default()
    }

    fn path(&self, name: &str) -> Option<String> {
        self.optional(name)
            .map(|p| resolve_path(self.root, &p).to_string_lossy().into_owned())
    }

    fn flag(&self, name: &str) -> bool {
        matches!(
            self.optional(name).as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("1" | "true" | "yes" | "on")
        )
    }

    fn any_set(&self, prefix: &str) -> bool {
        KNOWN_SUFFIXES
            .iter()
            .any(|suffix| self.optional(&format!("{prefix}{suffix}")).is_some())
    }
}

pub fn resolve_path(root: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

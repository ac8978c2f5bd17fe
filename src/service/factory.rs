use crate::config::{ConfigSource, EnvConfigSource, ProviderConfig};
use crate::domain::error::{GatewayError, Result};
use crate::gateways::alipay::AlipayGateway;
use crate::gateways::sdk::{NoSdkConnector, SdkConnector};
use crate::gateways::wechat::WechatGateway;
use crate::gateways::wechat_v2::WechatV2Gateway;
use crate::gateways::{PaymentProvider, Provider};
use crate::validator;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type CacheKey = (Provider, u64);

/// Resolves provider names to ready adapters and keeps one instance per
/// provider and configuration for the life of the process.
pub struct GatewayFactory {
    config_source: Arc<dyn ConfigSource>,
    sdk_connector: Arc<dyn SdkConnector>,
    instances: RwLock<HashMap<CacheKey, Arc<dyn PaymentProvider>>>,
}

impl GatewayFactory {
    pub fn new(config_source: Arc<dyn ConfigSource>) -> Self {
        Self {
            config_source,
            sdk_connector: Arc::new(NoSdkConnector),
            instances: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_env() -> Self {
        Self::new(Arc::new(EnvConfigSource::from_env()))
    }

    pub fn with_sdk_connector(mut self, connector: Arc<dyn SdkConnector>) -> Self {
        self.sdk_connector = connector;
        self
    }

    /// Looks up (or builds) the adapter for `provider_name`. Without an explicit
    /// config the provider's default config is used.
    pub async fn resolve(
        &self,
        provider_name: &str,
        config: Option<ProviderConfig>,
    ) -> Result<Arc<dyn PaymentProvider>> {
        let provider: Provider = provider_name.parse()?;
        self.resolve_provider(provider, config).await
    }

    pub async fn resolve_provider(
        &self,
        provider: Provider,
        config: Option<ProviderConfig>,
    ) -> Result<Arc<dyn PaymentProvider>> {
        let config = match config {
            Some(config) => config,
            None => self
                .config_source
                .provider_config(provider)
                .ok_or_else(|| GatewayError::Config(format!("{provider} is not configured")))?,
        };
        if config.provider() != provider {
            return Err(GatewayError::Validation(format!(
                "{} configuration cannot be used for {provider}",
                config.provider()
            )));
        }

        let key = (provider, config.fingerprint());
        {
            let read = self.instances.read().await;
            if let Some(instance) = read.get(&key) {
                return Ok(instance.clone());
            }
        }

        // built under the write lock so concurrent first callers share one client
        let mut write = self.instances.write().await;
        if let Some(instance) = write.get(&key) {
            return Ok(instance.clone());
        }
        let instance = self.construct(&config).map_err(|e| {
            tracing::error!(
                provider = %provider,
                error = %e,
                "payment adapter initialisation failed"
            );
            GatewayError::Config(format!("failed to initialise {provider}: {}", e.detail()))
        })?;
        tracing::info!(provider = %provider, "payment adapter initialised");
        write.insert(key, instance.clone());
        Ok(instance)
    }

    fn construct(&self, config: &ProviderConfig) -> Result<Arc<dyn PaymentProvider>> {
        let instance: Arc<dyn PaymentProvider> = match config {
            ProviderConfig::WechatV2(cfg) => Arc::new(WechatV2Gateway::new(cfg.clone())?),
            ProviderConfig::Wechat(cfg) => {
                validator::validate_wechat(cfg)?;
                let client = self.sdk_connector.connect(config)?;
                Arc::new(WechatGateway::new(cfg.clone(), client)?)
            }
            ProviderConfig::Alipay(cfg) => {
                validator::validate_alipay(cfg)?;
                let client = self.sdk_connector.connect(config)?;
                Arc::new(AlipayGateway::new(cfg.clone(), client)?)
            }
        };
        Ok(instance)
    }

    /// Providers whose default configuration passes validation, in declaration
    /// order. Nothing is constructed.
    pub fn available_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|provider| match self.config_source.provider_config(*provider) {
                None => {
                    tracing::debug!(provider = %provider, "no configuration, skipping");
                    false
                }
                Some(config) if config.provider() != *provider => {
                    tracing::warn!(
                        provider = %provider,
                        "configuration belongs to another provider, skipping"
                    );
                    false
                }
                Some(config) => match validator::validate(&config) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::debug!(
                            provider = %provider,
                            error = %e,
                            "configuration incomplete, skipping"
                        );
                        false
                    }
                },
            })
            .collect()
    }

    /// Drops cached adapters for one provider, or all of them.
    pub async fn evict(&self, provider: Option<Provider>) {
        let mut write = self.instances.write().await;
        match provider {
            Some(provider) => write.retain(|(cached, _), _| *cached != provider),
            None => write.clear(),
        }
    }

    pub async fn cached_instances(&self) -> usize {
        self.instances.read().await.len()
    }
}

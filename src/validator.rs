//! Precondition checks run before an adapter is constructed.
//!
//! Each check stops at the first violation, in field declaration order, and
//! touches nothing but the filesystem (to confirm that configured paths exist).

use crate::config::{AlipayConfig, ProviderConfig, WechatConfig, WechatV2Config};
use crate::domain::error::{GatewayError, Result};
use std::path::Path;

pub const API_V3_KEY_LEN: usize = 32;

pub fn validate(config: &ProviderConfig) -> Result<()> {
    match config {
        ProviderConfig::WechatV2(cfg) => validate_wechat_v2(cfg),
        ProviderConfig::Wechat(cfg) => validate_wechat(cfg),
        ProviderConfig::Alipay(cfg) => validate_alipay(cfg),
    }
}

pub fn validate_wechat_v2(cfg: &WechatV2Config) -> Result<()> {
    require("app_id", &cfg.app_id)?;
    require("mch_id", &cfg.mch_id)?;
    require("key", &cfg.key)?;
    require_url("notify_url", &cfg.notify_url)?;
    optional_file("cert_path", cfg.cert_path.as_deref())?;
    optional_file("key_path", cfg.key_path.as_deref())?;
    Ok(())
}

pub fn validate_wechat(cfg: &WechatConfig) -> Result<()> {
    require("app_id", &cfg.app_id)?;
    require("mch_id", &cfg.mch_id)?;
    require("serial_no", &cfg.serial_no)?;
    either(
        "private_key_path",
        cfg.private_key_path.as_deref(),
        "private_key",
        cfg.private_key.as_deref(),
    )?;
    require("api_v3_key", &cfg.api_v3_key)?;
    if cfg.api_v3_key.chars().count() != API_V3_KEY_LEN {
        return Err(GatewayError::Config(format!(
            "api_v3_key must be exactly {API_V3_KEY_LEN} characters"
        )));
    }
    require_url("notify_url", &cfg.notify_url)?;
    optional_file("platform_cert_path", cfg.platform_cert_path.as_deref())?;
    Ok(())
}

pub fn validate_alipay(cfg: &AlipayConfig) -> Result<()> {
    require("app_id", &cfg.app_id)?;
    either(
        "private_key_path",
        cfg.private_key_path.as_deref(),
        "private_key",
        cfg.private_key.as_deref(),
    )?;
    either(
        "alipay_public_key_path",
        cfg.alipay_public_key_path.as_deref(),
        "alipay_public_key",
        cfg.alipay_public_key.as_deref(),
    )?;
    require_url("notify_url", &cfg.notify_url)?;
    Ok(())
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GatewayError::Config(format!("{field} is required")));
    }
    Ok(())
}

fn require_url(field: &str, value: &str) -> Result<()> {
    require(field, value)?;
    let value = value.trim();
    if !(value.starts_with("https://") || value.starts_with("http://")) {
        return Err(GatewayError::Config(format!(
            "{field} must be an absolute http(s) url"
        )));
    }
    Ok(())
}

fn optional_file(field: &str, path: Option<&str>) -> Result<()> {
    match present(path) {
        Some(p) => require_file(field, p),
        None => Ok(()),
    }
}

fn require_file(field: &str, path: &str) -> Result<()> {
    if !Path::new(path).is_file() {
        return Err(GatewayError::Config(format!("{field} does not exist: {path}")));
    }
    Ok(())
}

/// Literal key material wins and skips the filesystem entirely.
fn either(
    path_field: &str,
    path: Option<&str>,
    literal_field: &str,
    literal: Option<&str>,
) -> Result<()> {
    if present(literal).is_some() {
        return Ok(());
    }
    match present(path) {
        Some(p) => require_file(path_field, p),
        None => Err(GatewayError::Config(format!(
            "{path_field} or {literal_field} is required"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v2() -> WechatV2Config {
        WechatV2Config {
            app_id: "wx8888888888888888".into(),
            mch_id: "1900000109".into(),
            key: "192006250b4c09247ec02edce69f6a2d".into(),
            notify_url: "https://example.com/notify".into(),
            ..WechatV2Config::default()
        }
    }

    #[test]
    fn whitespace_is_not_a_value() {
        let cfg = WechatV2Config {
            mch_id: "   ".into(),
            ..v2()
        };
        assert_eq!(
            validate_wechat_v2(&cfg),
            Err(GatewayError::Config("mch_id is required".into()))
        );
    }

    #[test]
    fn first_violation_in_declaration_order() {
        let cfg = WechatV2Config::default();
        assert_eq!(
            validate_wechat_v2(&cfg),
            Err(GatewayError::Config("app_id is required".into()))
        );
    }

    #[test]
    fn missing_cert_file_is_rejected() {
        let cfg = WechatV2Config {
            cert_path: Some("/definitely/not/here.pem".into()),
            ..v2()
        };
        let err = validate_wechat_v2(&cfg).unwrap_err();
        assert!(err.detail().starts_with("cert_path does not exist"));
    }

    #[test]
    fn relative_notify_url_is_rejected() {
        let cfg = WechatV2Config {
            notify_url: "/notify".into(),
            ..v2()
        };
        assert!(validate_wechat_v2(&cfg).is_err());
    }

    #[test]
    fn valid_v2_passes() {
        assert_eq!(validate_wechat_v2(&v2()), Ok(()));
    }
}

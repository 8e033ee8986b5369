//! Konfig 数据类型定义
//!
//! - `Konfig`: 单个环境配置（所有字段可选，以区分“未设置”与零值）
//! - `Konfigs`: 以配置 ID 为键的配置集合
//! - `UsedKonfig`: 当前激活配置的引用
//! - `Environments`: 构造默认配置所需的环境描述

use crate::data::{Result, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::btree_map::{self, BTreeMap};
use url::Url;

/// 内置 Koding 服务地址
pub const KODING_BASE_URL: &str = "https://koding.com";
const TUNNEL_URL: &str = "http://t.koding.com/kite";
const IP_CHECK_URL: &str = "https://p.koding.com/-/ipcheck";
const DEFAULT_KITE_KEY_FILE: &str = "/etc/kite/kite.key";
const DEFAULT_BUCKET_NAME: &str = "koding-dl";
const DEFAULT_BUCKET_REGION: &str = "us-east-1";
const DEFAULT_ENV: &str = "production";

/// 配置 ID 长度（十六进制字符数）
const ID_LEN: usize = 12;

// ==================== 环境描述 ====================

/// 构造默认配置所需的环境描述
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environments {
    pub env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub klient_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kd_env: Option<String>,
}

impl Environments {
    pub fn new(env: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            klient_env: None,
            kd_env: None,
        }
    }

    pub fn env(&self) -> &str {
        if self.env.is_empty() {
            DEFAULT_ENV
        } else {
            &self.env
        }
    }

    pub fn klient_env(&self) -> &str {
        self.klient_env.as_deref().unwrap_or_else(|| self.env())
    }

    pub fn kd_env(&self) -> &str {
        self.kd_env.as_deref().unwrap_or_else(|| self.env())
    }
}

/// 去掉 managed 安装的环境后缀（"managed" -> "production"，"devmanaged" -> "development"）
fn rm_managed(env: &str) -> &str {
    match env {
        "managed" => "production",
        "devmanaged" => "development",
        other => other,
    }
}

// ==================== Konfig ====================

/// 单个服务端点
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<String>,
}

impl Endpoint {
    pub fn public(url: impl Into<String>) -> Self {
        Self {
            public: Some(url.into()),
            private: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub koding: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_check: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kd_latest: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub klient_latest: Option<Endpoint>,
}

/// 环境配置
///
/// 未知字段保存在 `extra` 中，保证其他版本写入的记录可以原样往返。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Konfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Endpoints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kite_key_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kite_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_bucket_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_bucket_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Konfig {
    /// 按环境描述构造内置默认配置
    pub fn new(env: &Environments) -> Self {
        let latest = |bucket: &str, env: &str| {
            Endpoint::public(format!(
                "https://{bucket}.s3.amazonaws.com/{}/latest-version.txt",
                rm_managed(env)
            ))
        };

        Self {
            endpoints: Some(Endpoints {
                koding: Some(Endpoint::public(KODING_BASE_URL)),
                tunnel: Some(Endpoint::public(TUNNEL_URL)),
                ip_check: Some(Endpoint::public(IP_CHECK_URL)),
                kd_latest: Some(latest("koding-kd", env.kd_env())),
                klient_latest: Some(latest("koding-klient", env.klient_env())),
            }),
            kite_key_file: Some(DEFAULT_KITE_KEY_FILE.to_string()),
            kite_key: None,
            environment: Some(env.env().to_string()),
            public_bucket_name: Some(DEFAULT_BUCKET_NAME.to_string()),
            public_bucket_region: Some(DEFAULT_BUCKET_REGION.to_string()),
            debug: Some(false),
            extra: Map::new(),
        }
    }

    /// 只设置 Koding 公网地址的最小配置
    pub fn with_koding_url(url: impl Into<String>) -> Self {
        Self {
            endpoints: Some(Endpoints {
                koding: Some(Endpoint::public(url)),
                ..Endpoints::default()
            }),
            ..Self::default()
        }
    }

    pub fn koding_public(&self) -> Option<&str> {
        self.endpoints.as_ref()?.koding.as_ref()?.public.as_deref()
    }

    /// 由 Koding 公网地址派生的确定性 ID
    pub fn id(&self) -> String {
        konfig_id(self.koding_public().unwrap_or_default())
    }

    /// 校验配置是否可用
    pub fn valid(&self) -> Result<()> {
        let public = self
            .koding_public()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| StoreError::Validation("koding public endpoint is missing".into()))?;

        let url = Url::parse(public).map_err(|e| {
            StoreError::Validation(format!("koding public endpoint {public:?} is invalid: {e}"))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(StoreError::Validation(format!(
                "koding public endpoint {public:?} has unsupported scheme {scheme:?}"
            ))),
        }
    }
}

/// 计算 Koding 地址对应的配置 ID
///
/// 路径末尾的 `/` 会被去除，使 "example.com/koding" 与 "example.com/koding/"
/// 得到相同的 ID。空地址返回空 ID。
pub fn konfig_id(koding_url: &str) -> String {
    if koding_url.is_empty() {
        return String::new();
    }

    let normalized = match Url::parse(koding_url) {
        Ok(mut url) => {
            let path = url.path().trim_end_matches('/').to_string();
            url.set_path(&path);
            url.to_string()
        }
        Err(_) => koding_url.to_string(),
    };

    let digest = format!("{:x}", Sha256::digest(normalized.as_bytes()));
    digest[..ID_LEN].to_string()
}

// ==================== Konfigs ====================

/// 配置集合（ID -> Konfig）
///
/// 通过 `insert` 写入时键总是等于配置自身的 ID。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Konfigs(BTreeMap<String, Konfig>);

impl Konfigs {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以配置 ID 为键插入（覆盖同 ID 配置），返回 ID
    pub fn insert(&mut self, konfig: Konfig) -> String {
        let id = konfig.id();
        self.0.insert(id.clone(), konfig);
        id
    }

    pub fn get(&self, id: &str) -> Option<&Konfig> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Konfig> {
        self.0.iter()
    }

    /// 键与配置 ID 不一致的条目（由其他写入方造成）
    pub fn mismatched_ids(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(id, konfig)| konfig.id() != **id)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

impl<'a> IntoIterator for &'a Konfigs {
    type Item = (&'a String, &'a Konfig);
    type IntoIter = btree_map::Iter<'a, String, Konfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Konfig> for Konfigs {
    fn from_iter<I: IntoIterator<Item = Konfig>>(iter: I) -> Self {
        let mut konfigs = Konfigs::new();
        for konfig in iter {
            konfigs.insert(konfig);
        }
        konfigs
    }
}

/// 当前激活配置的引用（`konfigs.used`）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedKonfig {
    pub id: String,
}

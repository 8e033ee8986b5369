//! 配置覆盖合并
//!
//! 覆盖层中已设置（`Some`）的字段优先，未设置（`None`）的字段保留基础值；
//! 嵌套结构递归合并。显式设置的零值（`""`、`false`）视为已设置。

use crate::data::{Result, StoreError};
use crate::models::{Endpoint, Endpoints, Konfig};
use serde_json::{Map, Value};

/// 字段级覆盖合并
pub trait Merge {
    /// 将 `overlay` 中已设置的字段合并到自身
    fn merge_from(&mut self, overlay: &Self);
}

impl Merge for Endpoint {
    fn merge_from(&mut self, overlay: &Self) {
        merge_option(&mut self.public, &overlay.public);
        merge_option(&mut self.private, &overlay.private);
    }
}

impl Merge for Endpoints {
    fn merge_from(&mut self, overlay: &Self) {
        merge_nested(&mut self.koding, &overlay.koding);
        merge_nested(&mut self.tunnel, &overlay.tunnel);
        merge_nested(&mut self.ip_check, &overlay.ip_check);
        merge_nested(&mut self.kd_latest, &overlay.kd_latest);
        merge_nested(&mut self.klient_latest, &overlay.klient_latest);
    }
}

impl Merge for Konfig {
    fn merge_from(&mut self, overlay: &Self) {
        merge_nested(&mut self.endpoints, &overlay.endpoints);
        merge_option(&mut self.kite_key_file, &overlay.kite_key_file);
        merge_option(&mut self.kite_key, &overlay.kite_key);
        merge_option(&mut self.environment, &overlay.environment);
        merge_option(&mut self.public_bucket_name, &overlay.public_bucket_name);
        merge_option(&mut self.public_bucket_region, &overlay.public_bucket_region);
        merge_option(&mut self.debug, &overlay.debug);
        merge_map(&mut self.extra, &overlay.extra);
    }
}

/// 将缓存中读出的原始覆盖层合并到 `base`
///
/// 覆盖层无法解码时返回 `StoreError::Merge`，未通过校验时返回
/// `StoreError::Validation`；两种情况下 `base` 均保持不变。
pub fn merge_in(base: &mut Konfig, raw: &Value) -> Result<()> {
    let overlay: Konfig = serde_json::from_value(raw.clone()).map_err(StoreError::Merge)?;
    overlay.valid()?;

    base.merge_from(&overlay);
    Ok(())
}

fn merge_option<T: Clone>(base: &mut Option<T>, overlay: &Option<T>) {
    if overlay.is_some() {
        base.clone_from(overlay);
    }
}

fn merge_nested<T: Merge + Clone>(base: &mut Option<T>, overlay: &Option<T>) {
    let Some(overlay) = overlay else {
        return;
    };
    match base {
        Some(base) => base.merge_from(overlay),
        None => *base = Some(overlay.clone()),
    }
}

/// 深度合并未知字段，`null` 视为未设置
fn merge_map(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if value.is_null() {
            continue;
        }
        match target.get_mut(key) {
            Some(target_value) => merge_values(target_value, value),
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn merge_values(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target_obj), Value::Object(source_obj)) => {
            merge_map(target_obj, source_obj);
        }
        (target, source) => {
            // 非对象类型，直接替换
            *target = source.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Environments;
    use serde_json::json;

    fn base() -> Konfig {
        Konfig::new(&Environments::new("production"))
    }

    #[test]
    fn test_set_fields_win_unset_fields_kept() -> Result<()> {
        let mut konfig = base();
        merge_in(
            &mut konfig,
            &json!({
                "endpoints": {"koding": {"public": "https://dev.koding.com"}},
                "debug": true
            }),
        )?;

        assert_eq!(konfig.koding_public(), Some("https://dev.koding.com"));
        assert_eq!(konfig.debug, Some(true));

        // 未设置的字段来自默认配置
        let defaults = base();
        assert_eq!(konfig.kite_key_file, defaults.kite_key_file);
        assert_eq!(
            konfig.endpoints.as_ref().unwrap().tunnel,
            defaults.endpoints.as_ref().unwrap().tunnel
        );
        Ok(())
    }

    #[test]
    fn test_explicit_zero_values_override() -> Result<()> {
        let mut konfig = base();
        konfig.debug = Some(true);

        merge_in(
            &mut konfig,
            &json!({
                "endpoints": {"koding": {"public": "https://koding.com"}},
                "kiteKeyFile": "",
                "debug": false
            }),
        )?;

        assert_eq!(konfig.kite_key_file.as_deref(), Some(""));
        assert_eq!(konfig.debug, Some(false));
        Ok(())
    }

    #[test]
    fn test_null_is_unset() -> Result<()> {
        let mut konfig = base();
        merge_in(
            &mut konfig,
            &json!({
                "endpoints": {"koding": {"public": "https://koding.com"}},
                "kiteKeyFile": null
            }),
        )?;

        assert_eq!(konfig.kite_key_file, base().kite_key_file);
        Ok(())
    }

    #[test]
    fn test_nested_endpoint_merge_keeps_private() {
        let mut endpoint = Endpoint {
            public: Some("https://a".into()),
            private: Some("http://10.0.0.1".into()),
        };
        endpoint.merge_from(&Endpoint::public("https://b"));

        assert_eq!(endpoint.public.as_deref(), Some("https://b"));
        assert_eq!(endpoint.private.as_deref(), Some("http://10.0.0.1"));
    }

    #[test]
    fn test_unknown_fields_deep_merge() -> Result<()> {
        let mut konfig = base();
        konfig
            .extra
            .insert("mount".into(), json!({"inotify": true, "prefetch": 4}));

        merge_in(
            &mut konfig,
            &json!({
                "endpoints": {"koding": {"public": "https://koding.com"}},
                "mount": {"prefetch": 8},
                "template": {"file": "kd.yaml"}
            }),
        )?;

        assert_eq!(
            konfig.extra.get("mount"),
            Some(&json!({"inotify": true, "prefetch": 8}))
        );
        assert_eq!(konfig.extra.get("template"), Some(&json!({"file": "kd.yaml"})));
        Ok(())
    }

    #[test]
    fn test_undecodable_overlay_is_merge_error() {
        let mut konfig = base();
        let err = merge_in(&mut konfig, &json!({"debug": "maybe"})).unwrap_err();

        assert!(matches!(err, StoreError::Merge(_)));
        assert_eq!(konfig, base());
    }

    #[test]
    fn test_invalid_overlay_is_rejected() {
        let mut konfig = base();
        let err = merge_in(&mut konfig, &json!({"debug": true})).unwrap_err();

        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(konfig, base());
    }
}

//! 序列化/反序列化辅助模块

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 区分 "字段缺省" 与 "显式 null" 的可空字段
///
/// 配合 `#[serde(default, with = "nullable")]` 使用于 `Option<Option<T>>`：
/// 缺省为 `None`，`null` 为 `Some(None)`，有值为 `Some(Some(v))`。
pub mod nullable {
    use super::*;

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(Some(inner)) => serializer.serialize_some(inner),
            _ => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

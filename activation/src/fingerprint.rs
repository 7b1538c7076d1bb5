//! 设备指纹校验
//!
//! 展台二维码内容是裸的 64 位十六进制字符串（32 字节），
//! 不带前缀也不带校验位。校验在任何网络请求之前执行。

use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::ClientError;

/// 指纹长度（十六进制字符数）
pub const FINGERPRINT_LEN: usize = 64;

/// 校验扫描内容是否为合法指纹（大小写不敏感）
pub fn validate(raw: &str) -> bool {
    raw.len() == FINGERPRINT_LEN && hex::decode(raw).is_ok()
}

/// 已通过校验的设备指纹
///
/// 只能通过 [`Fingerprint::parse`] 构造，保存原始大小写。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        if validate(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ClientError::InvalidQr)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 用于展示和日志的短标签，例如 `AABBCCDD...11223344`
    pub fn short_label(&self) -> String {
        format!(
            "{}...{}",
            &self.0[..8],
            &self.0[FINGERPRINT_LEN - 8..]
        )
    }
}

// 完整指纹只出现在请求体里，Debug 输出使用短标签
impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short_label())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

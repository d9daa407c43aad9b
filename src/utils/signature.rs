use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// 币安请求签名工具
pub struct SignatureHelper;

impl SignatureHelper {
    /// Binance 签名: hex(HMAC-SHA256(query_string))
    pub fn binance_signature(secret: &str, query_string: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC 支持任意长度密钥");
        mac.update(query_string.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// URL 编码并保持参数插入顺序（币安按发送顺序校验签名）
    pub fn build_query_string<K, V>(params: &[(K, V)]) -> String
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        params
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    urlencoding::encode(k.as_ref()),
                    urlencoding::encode(v.as_ref())
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// 毫秒级时间戳
    pub fn timestamp() -> i64 {
        Utc::now().timestamp_millis()
    }
}

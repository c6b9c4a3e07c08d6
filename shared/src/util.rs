/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Normalize an email address for storage and lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

/// 派生密钥长度 (字节)
const HASH_LEN: usize = 32;

/// 长度不同直接返回 false；等长时逐字节比较，不提前退出
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0, |acc, (&x, &y)| acc | (x ^ y))
        == 0
}

/// hex(PBKDF2-HMAC-SHA256(password, salt, rounds))
pub fn hash_password(salt: &str, password: &str, rounds: u32) -> String {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), rounds.max(1), &mut out);
    out.iter().map(|b| format!("{:02x}", b)).collect()
}

/// 轮数取自凭据本身，调高配置不影响已有账户登录
pub fn verify_password(salt: &str, password: &str, rounds: u32, expected_hash: &str) -> bool {
    constant_time_eq(&hash_password(salt, password, rounds), expected_hash)
}

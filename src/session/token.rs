use rand::Rng;
use sha2::{Digest, Sha256};

/// 令牌随机字节数（160 位熵）
pub const SESSION_TOKEN_BYTES: usize = 20;

/// 生成会话令牌：来自 CSPRNG 的随机字节，小写十六进制编码
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}

/// 由令牌推导会话 ID，服务端只保存这个值
pub fn session_id_from_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn is_well_formed(token: &str) -> bool {
    token.len() == SESSION_TOKEN_BYTES * 2
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

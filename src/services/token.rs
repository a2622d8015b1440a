use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};

/// リセットトークンの長さ（文字数）
pub const TOKEN_LENGTH: usize = 24;

/// リセットトークンの生成器
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// OS の CSPRNG を使った英数字トークン生成器
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphanumericTokenGenerator;

impl TokenGenerator for AlphanumericTokenGenerator {
    fn generate(&self) -> String {
        generate_token_with(&mut OsRng)
    }
}

/// 英数字62文字から一様に24文字のトークンを生成
///
/// # Security
/// 暗号論的に安全な乱数源のみ受け付ける
pub fn generate_token_with<R: RngCore + CryptoRng>(rng: &mut R) -> String {
    (0..TOKEN_LENGTH)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

/// 定数時間のバイト列比較
///
/// 長さが異なる場合も長い方の全バイトを走査し、不一致の位置によって
/// 処理時間が変わらないようにする。
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let len = a.len().max(b.len());
    let mut diff = a.len() ^ b.len();

    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }

    diff == 0
}

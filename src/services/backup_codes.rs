use std::collections::HashSet;

use rand::Rng;
use sha2::{Digest, Sha256};

/// バックアップコードの長さ
pub const CODE_LENGTH: usize = 8;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// 8文字（英大文字・数字）のバックアップコードを `count` 個生成
///
/// バッチ内の重複は除外する
pub fn generate_backup_codes(count: usize) -> Vec<String> {
    let mut rng = rand::rngs::OsRng;
    let mut seen = HashSet::with_capacity(count);
    let mut codes = Vec::with_capacity(count);

    while codes.len() < count {
        let code: String = (0..CODE_LENGTH)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect();
        if seen.insert(code.clone()) {
            codes.push(code);
        }
    }

    codes
}

/// バックアップコードをSHA256でハッシュ化（保存・照合用）
///
/// 前後の空白は除去し、大文字に揃えてからハッシュ化する
pub fn hash_backup_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.trim().to_ascii_uppercase().as_bytes());
    format!("{:x}", hasher.finalize())
}

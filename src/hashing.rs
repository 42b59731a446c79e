// ==========================================
// 商品目录导入系统 - 文件哈希
// ==========================================
// 用途: 上传内容 SHA-256, 作为幂等去重键 (file_hash, kind, mode) 的一部分
// ==========================================

use sha2::{Digest, Sha256};

/// 计算字节内容的 SHA-256 十六进制摘要
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_known_hash() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_consistent_output() {
        let data = "title,price\n".as_bytes();
        assert_eq!(sha256_hex(data), sha256_hex(data));
        assert_eq!(sha256_hex(data).len(), 64);
    }
}

use sha2::{ Digest, Sha256 };


/// SHA-256 digest of a single buffer.

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hasher.finalize().into()
}

/// Single SHA-256 digest over three successive buffers, as used for
/// the snapshot topology hash.

pub fn sha256_concat3(a: &[u8], b: &[u8], c: &[u8]) -> [u8; 32] {
  let mut hasher = Sha256::new();
  hasher.update(a);
  hasher.update(b);
  hasher.update(c);
  hasher.finalize().into()
}

/// Render a digest as uppercase hex.

pub fn to_hex_upper(digest: &[u8]) -> String {
  digest.iter().map(|b| format!("{:02X}", b) ).collect()
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn known_digest() {
    // SHA-256 of the empty string
    assert_eq!(
      to_hex_upper(&sha256(b"")),
      "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855",
    );
  }

  #[test]
  fn concat_equals_contiguous() {
    let whole = sha256(b"abcdef");
    let parts = sha256_concat3(b"ab", b"cd", b"ef");
    assert_eq!(whole, parts);
  }

  #[test]
  fn avalanche() {
    assert_ne!(sha256(b"graph"), sha256(b"grapi"));
  }
}

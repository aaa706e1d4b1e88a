use anyhow::{Context, Result};

/// Decode URL percent-encoding into raw bytes.
///
/// Announce clients send `info_hash` and `peer_id` as percent-encoded
/// binary, which a generic form decoder would mangle into lossy UTF-8.
pub fn url_decode(encoded: &str) -> Result<Vec<u8>> {
    let input = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        match input[i] {
            b'%' => {
                let pair = input
                    .get(i + 1..i + 3)
                    .context("Truncated percent-encoding")?;
                let hi = hex_digit(pair[0]).context("Invalid hex digit in percent-encoding")?;
                let lo = hex_digit(pair[1]).context("Invalid hex digit in percent-encoding")?;
                decoded.push(hi << 4 | lo);
                i += 3;
            }
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            byte => {
                decoded.push(byte);
                i += 1;
            }
        }
    }

    Ok(decoded)
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_escaped() {
        assert_eq!(url_decode("abc").unwrap(), b"abc");
        assert_eq!(url_decode("%41%42%43").unwrap(), b"ABC");
        assert_eq!(url_decode("a%20b+c").unwrap(), b"a b c");
        assert_eq!(url_decode("%FF%00").unwrap(), vec![0xff, 0x00]);
        assert_eq!(url_decode("%fF").unwrap(), vec![0xff]);
    }

    #[test]
    fn test_truncated_or_bad_escapes() {
        assert!(url_decode("%").is_err());
        assert!(url_decode("abc%4").is_err());
        assert!(url_decode("%zz").is_err());
    }

    #[test]
    fn test_binary_info_hash_roundtrip() {
        let encoded = "%12%34%56%78%9a%bc%de%f0%11%22%33%44%55%66%77%88%99%aa%bb%cc";
        let decoded = url_decode(encoded).unwrap();
        assert_eq!(decoded.len(), 20);
        assert_eq!(decoded[0], 0x12);
        assert_eq!(decoded[19], 0xcc);
    }
}

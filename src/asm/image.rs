//! Program image file format.
//!
//! An image is plain text: hex byte tokens separated by whitespace,
//! with `;` comments and blank lines ignored.
//!
//! ```text
//! ; sum 1..10
//! 00 81 a0 0b 81 a2 01 81 a4 e0
//! 80 a1 24 81 a0 01 24 81 a4 42
//! c1 80 a1
//! ```

use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Parse image text into program bytes.
pub fn parse_image(text: &str) -> Result<Vec<u8>, ImageError> {
    let mut bytes = Vec::new();
    for (line_num, line) in text.lines().enumerate() {
        let code = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        for token in code.split_whitespace() {
            let byte = u8::from_str_radix(token, 16).map_err(|_| ImageError::BadByte {
                line: line_num + 1,
                token: token.to_string(),
            })?;
            bytes.push(byte);
        }
    }
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    Ok(bytes)
}

/// Load a program image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, ImageError> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ImageError::Io(e.to_string()))?;
    parse_image(&text)
}

/// Save program bytes as an image file, 16 bytes per row.
pub fn save_image<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), ImageError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| ImageError::Io(e.to_string()))?;

    writeln!(file, "; program image, {} bytes", bytes.len())
        .map_err(|e| ImageError::Io(e.to_string()))?;
    for row in bytes.chunks(16) {
        let line: Vec<String> = row.iter().map(|b| format!("{:02x}", b)).collect();
        writeln!(file, "{}", line.join(" ")).map_err(|e| ImageError::Io(e.to_string()))?;
    }
    Ok(())
}

/// Errors that can occur reading or writing images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("line {line}: {token:?} is not a hex byte")]
    BadByte { line: usize, token: String },

    #[error("image contains no bytes")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_image() {
        let text = "; header\n00 81 a0 ; init\n0b 81 a2\n\nc1\n";
        assert_eq!(
            parse_image(text).unwrap(),
            vec![0x00, 0x81, 0xa0, 0x0b, 0x81, 0xa2, 0xc1]
        );
    }

    #[test]
    fn test_parse_rejects_bad_token() {
        assert_eq!(
            parse_image("00 zz"),
            Err(ImageError::BadByte { line: 1, token: "zz".to_string() })
        );
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(parse_image("; nothing\n"), Err(ImageError::Empty));
    }
}

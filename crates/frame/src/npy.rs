//! NumPy `.npy` persistence for 1-D `f64` arrays
//!
//! Writes format version 1.0 with a little-endian `<f8` payload, which NumPy
//! loads with `np.load`. Reading accepts versions 1.0 and 2.0 of the same
//! layout.

use std::fs;
use std::path::Path;

use crate::errors::{FrameError, Result};

const MAGIC: &[u8] = b"\x93NUMPY";
const ALIGNMENT: usize = 64;

/// Encode a 1-D array into `.npy` bytes.
pub fn to_npy_bytes(values: &[f64]) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': ({},), }}",
        values.len()
    );

    // magic(6) + version(2) + header_len(2) + header + '\n' must align to 64
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let mut bytes = Vec::with_capacity(MAGIC.len() + 4 + header.len() + values.len() * 8);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Write a 1-D array to `path`.
pub fn write_npy<P: AsRef<Path>>(path: P, values: &[f64]) -> Result<()> {
    fs::write(path, to_npy_bytes(values))?;
    Ok(())
}

/// Decode `.npy` bytes holding a 1-D little-endian `f64` array.
pub fn from_npy_bytes(bytes: &[u8]) -> Result<Vec<f64>> {
    if bytes.len() < MAGIC.len() + 4 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(FrameError::InvalidNpy("missing magic string".into()));
    }

    let major = bytes[MAGIC.len()];
    let (header_len, header_start) = match major {
        1 => {
            let len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
            (len, 10)
        }
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(FrameError::InvalidNpy("truncated header".into()));
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
            (len, 12)
        }
        other => {
            return Err(FrameError::InvalidNpy(format!(
                "unsupported format version {}",
                other
            )))
        }
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(FrameError::InvalidNpy("truncated header".into()));
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|e| FrameError::InvalidNpy(format!("header is not UTF-8: {}", e)))?;

    if !header.contains("'descr': '<f8'") {
        return Err(FrameError::InvalidNpy(format!(
            "unsupported dtype in header: {}",
            header.trim()
        )));
    }
    if header.contains("'fortran_order': True") {
        return Err(FrameError::InvalidNpy("fortran order is not supported".into()));
    }

    let len = parse_shape(header)?;
    let payload = &bytes[data_start..];
    if payload.len() != len * 8 {
        return Err(FrameError::InvalidNpy(format!(
            "expected {} bytes of data, found {}",
            len * 8,
            payload.len()
        )));
    }

    Ok(payload
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect())
}

/// Read a 1-D array from `path`.
pub fn read_npy<P: AsRef<Path>>(path: P) -> Result<Vec<f64>> {
    from_npy_bytes(&fs::read(path)?)
}

fn parse_shape(header: &str) -> Result<usize> {
    let start = header
        .find("'shape': (")
        .ok_or_else(|| FrameError::InvalidNpy("missing shape".into()))?
        + "'shape': (".len();
    let end = header[start..]
        .find(')')
        .ok_or_else(|| FrameError::InvalidNpy("unterminated shape".into()))?
        + start;

    let dims: Vec<&str> = header[start..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    match dims.as_slice() {
        [len] => len
            .parse::<usize>()
            .map_err(|e| FrameError::InvalidNpy(format!("invalid shape: {}", e))),
        _ => Err(FrameError::InvalidNpy(format!(
            "expected a 1-D shape, found ({})",
            &header[start..end]
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_alignment() {
        let bytes = to_npy_bytes(&[1.0, 2.0, 3.0]);
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % ALIGNMENT, 0);
        assert_eq!(bytes[10 + header_len - 1], b'\n');
        assert_eq!(bytes.len(), 10 + header_len + 24);
    }

    #[test]
    fn test_decode_preserves_nan() {
        let decoded = from_npy_bytes(&to_npy_bytes(&[0.25, f64::NAN])).unwrap();
        assert_eq!(decoded[0], 0.25);
        assert!(decoded[1].is_nan());
    }

    #[test]
    fn test_empty_array() {
        let decoded = from_npy_bytes(&to_npy_bytes(&[])).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_rejects_other_dtypes() {
        let mut bytes = to_npy_bytes(&[1.0]);
        let pos = bytes.windows(3).position(|w| w == b"<f8").unwrap();
        bytes[pos + 2] = b'4';
        assert!(matches!(
            from_npy_bytes(&bytes),
            Err(FrameError::InvalidNpy(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(from_npy_bytes(b"not an array").is_err());
    }
}

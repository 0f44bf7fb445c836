//! Framing for compressed net data files.
//!
//! ```text
//!   magic     8 bytes   "NETDAT01"
//!   version   u32 LE
//!   tag       4 bytes
//!   raw_len   u32 LE    size of the payload once decompressed
//!   block_len u32 LE
//!   block     block_len bytes of LZ4
//! ```
//!
//! Every failure to parse a frame is a [`HistoryError::Format`].

use std::io::Write;

use crate::error::{HistoryError, Result};

pub const MAGIC: &[u8; 8] = b"NETDAT01";
pub const VERSION: u32 = 1;

/// An LZ4 block cannot expand to more than this multiple of its own size.
const MAX_LZ4_RATIO: usize = 255;

pub fn write_frame<W: Write>(w: &mut W, tag: [u8; 4], payload: &[u8]) -> Result<()> {
    let block = lz4_flex::compress(payload);
    let too_large = |_| HistoryError::format("payload exceeds 4 GiB");
    let raw_len = u32::try_from(payload.len()).map_err(too_large)?;
    let block_len = u32::try_from(block.len()).map_err(too_large)?;

    w.write_all(MAGIC)?;
    w.write_all(&VERSION.to_le_bytes())?;
    w.write_all(&tag)?;
    w.write_all(&raw_len.to_le_bytes())?;
    w.write_all(&block_len.to_le_bytes())?;
    w.write_all(&block)?;
    Ok(())
}

/// True when `bytes` begins like a frame written by [`write_frame`].
pub fn is_framed(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Parse one frame, returning its tag and decompressed payload.
pub fn read_frame(bytes: &[u8]) -> Result<([u8; 4], Vec<u8>)> {
    let rest = bytes
        .strip_prefix(MAGIC.as_slice())
        .ok_or_else(|| HistoryError::format("missing NETDAT01 magic"))?;
    let (version, rest) = take_u32(rest, "version")?;
    if version != VERSION {
        return Err(HistoryError::format(format!(
            "unsupported net data version {version}"
        )));
    }
    let (tag, rest) = take::<4>(rest, "chunk tag")?;
    let (raw_len, rest) = take_u32(rest, "payload length")?;
    let (block_len, rest) = take_u32(rest, "block length")?;

    let block = rest.get(..block_len as usize).ok_or_else(|| {
        HistoryError::format(format!(
            "truncated block: {} of {block_len} bytes present",
            rest.len()
        ))
    })?;
    let raw_len = raw_len as usize;
    if raw_len > block.len().saturating_mul(MAX_LZ4_RATIO) {
        return Err(HistoryError::format(format!(
            "payload of {raw_len} bytes cannot come from a {}-byte block",
            block.len()
        )));
    }
    let payload = lz4_flex::decompress(block, raw_len)
        .map_err(|e| HistoryError::format(format!("lz4: {e}")))?;
    Ok((tag, payload))
}

fn take<'a, const N: usize>(bytes: &'a [u8], what: &str) -> Result<([u8; N], &'a [u8])> {
    if bytes.len() < N {
        return Err(HistoryError::format(format!("truncated {what}")));
    }
    let (head, rest) = bytes.split_at(N);
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    Ok((out, rest))
}

fn take_u32<'a>(bytes: &'a [u8], what: &str) -> Result<(u32, &'a [u8])> {
    let (raw, rest) = take::<4>(bytes, what)?;
    Ok((u32::from_le_bytes(raw), rest))
}

//! PNG checksum-repair compatibility shim.
//!
//! Some widely circulated tools emit PNGs with stale chunk CRCs that strict
//! decoders reject. When enabled, a failed decode of PNG-looking bytes gets a
//! single repair pass: walk the chunk stream without validating the stored
//! CRCs, recompute each CRC-32 over the chunk type and data, and re-serialize.
//! This can mask genuinely corrupted input, so it is off by default.

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Bytes per chunk besides the data: 4 length + 4 type + 4 CRC.
const CHUNK_OVERHEAD: usize = 12;

/// True if the payload carries a PNG signature.
pub fn looks_like_png(data: &[u8]) -> bool {
    data.len() >= PNG_SIGNATURE.len() && &data[..PNG_SIGNATURE.len()] == PNG_SIGNATURE
}

/// Re-serialize the PNG chunk stream, recomputing chunk CRCs.
///
/// Stored CRCs are ignored entirely, so streams a strict parser would reject
/// for a checksum mismatch still come through. Returns `None` when the payload
/// is not a PNG or its chunk framing is too damaged to walk (truncated chunk,
/// no IEND).
pub fn repair_png(data: &[u8]) -> Option<Vec<u8>> {
    if !looks_like_png(data) {
        return None;
    }
    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(PNG_SIGNATURE);

    let mut offset = PNG_SIGNATURE.len();
    loop {
        let header = data.get(offset..offset + 8)?;
        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let chunk_type = &header[4..8];
        let body = data.get(offset + 8..offset + 8 + length)?;
        // The stored CRC must be present but its value is not trusted.
        data.get(offset + 8 + length..offset + CHUNK_OVERHEAD + length)?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(chunk_type);
        hasher.update(body);

        out.extend_from_slice(&(length as u32).to_be_bytes());
        out.extend_from_slice(chunk_type);
        out.extend_from_slice(body);
        out.extend_from_slice(&hasher.finalize().to_be_bytes());

        offset += CHUNK_OVERHEAD + length;
        if chunk_type == b"IEND" {
            return Some(out);
        }
    }
}

//! Info-hash extraction from `.torrent` bodies and magnet URIs.

use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};

use super::TorrentClientError;

/// Compute the lowercase hex info hash of a bencoded `.torrent` body.
pub fn info_hash_from_bytes(bytes: &[u8]) -> Result<String, TorrentClientError> {
    let torrent: TorrentMetaV1Owned =
        torrent_from_bytes(bytes).map_err(|e| TorrentClientError::InvalidTorrent(e.to_string()))?;
    Ok(torrent.info_hash.as_string().to_lowercase())
}

/// Extract the info hash from a magnet URI as lowercase hex.
///
/// Both the 40-character hex form and the 32-character base32 form of
/// `xt=urn:btih:` are accepted.
pub fn hash_from_magnet(magnet: &str) -> Option<String> {
    let (_, query) = magnet.split_once('?')?;
    let value = query
        .split('&')
        .find_map(|param| param.strip_prefix("xt=urn:btih:"))?;

    match value.len() {
        40 if value.chars().all(|c| c.is_ascii_hexdigit()) => Some(value.to_lowercase()),
        32 => base32_to_hex(value),
        _ => None,
    }
}

fn base32_to_hex(value: &str) -> Option<String> {
    let mut bits: u64 = 0;
    let mut bit_count = 0u32;
    let mut out = String::with_capacity(40);

    for c in value.chars() {
        let digit = match c.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u64 - 'A' as u64,
            c @ '2'..='7' => c as u64 - '2' as u64 + 26,
            _ => return None,
        };
        bits = (bits << 5) | digit;
        bit_count += 5;
        if bit_count >= 8 {
            bit_count -= 8;
            let byte = (bits >> bit_count) & 0xff;
            out.push_str(&format!("{byte:02x}"));
        }
    }

    (out.len() == 40).then_some(out)
}

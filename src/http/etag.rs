use std::{io, path::Path};

use tokio::{fs::File, io::AsyncReadExt};
use tracing::debug;

use crate::consts::HASH_CHUNK_SIZE;

/// Stream a file through MD5 and return the lowercase hex digest
///
/// Nothing is cached here, a failed read simply drops the partial digest.
pub async fn compute(path: &Path) -> io::Result<String> {
    let mut file = File::open(path).await?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    let etag = format!("{:x}", context.compute());
    debug!("File {:?} ETag: {:?}", path, etag);
    Ok(etag)
}

/// Check an `If-None-Match` value against a fingerprint
///
/// Accepts a comma separated list of tags, each optionally weak (`W/`) and
/// optionally quoted, and the `*` wildcard.
pub fn matches(if_none_match: &str, fingerprint: &str) -> bool {
    if_none_match.split(',').any(|tag| {
        let tag = tag.trim();
        if tag == "*" {
            return true;
        }
        let tag = tag.strip_prefix("W/").unwrap_or(tag);
        let tag = tag
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(tag);
        tag == fingerprint
    })
}

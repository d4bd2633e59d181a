use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Document;
use crate::query::TermQuery;

/// Largest frame this protocol will read before refusing it as malformed —
/// a defense against a corrupt or hostile length prefix driving an
/// unbounded allocation.
const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// Every RPC a worker answers. Kept as a flat enum encoded with `bincode`
/// rather than a second IDL/codegen-based format, since the whole stack
/// already carries `serde`+`bincode` for forward-store persistence — one
/// less format to keep in sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireRequest {
    AddDoc { document: Document },
    DeleteDoc { id: String },
    Search { query: TermQuery, on: u64, off: u64, or_flags: Vec<u64> },
    Count,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireResponse {
    DocAdded { int_id: u64 },
    DocDeleted { count: usize },
    SearchResult { documents: Vec<Document> },
    CountResult { count: usize },
    Failed { message: String },
}

/// Writes `value` as one frame: a 4-byte little-endian length prefix
/// followed by its `bincode` encoding.
pub async fn write_frame<T, W>(writer: &mut W, value: &T) -> Result<()>
where
    T: Serialize,
    W: AsyncWriteExt + Unpin,
{
    let encoded = bincode::serialize(value)?;
    let len: u32 = encoded
        .len()
        .try_into()
        .map_err(|_| Error::new(ErrorKind::InvalidArgument, "frame too large to encode"))?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame previously written by [`write_frame`].
pub async fn read_frame<T, R>(reader: &mut R) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    R: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(Error::new(ErrorKind::Parse, format!("frame of {len} bytes exceeds the {MAX_FRAME_BYTES} byte limit")));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(bincode::deserialize(&buf)?)
}

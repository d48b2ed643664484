use crate::error::SnapshotError;
use bytes::Bytes;
use std::io::{Read, Write};

/// 4-byte magic identifying a committed or staging snapshot file.
pub const MAGIC: &[u8; 4] = b"SSTH";
pub const VERSION: u16 = 1;

pub struct Header {
    pub name: String,
    pub max_key_count: u64,
    pub off_heap: bool,
}

pub struct Entry {
    pub key: Bytes,
    pub value: Bytes,
    /// Zero means no TTL.
    pub expires_at_ms: u64,
}

pub fn write_header<W: Write>(w: &mut W, header: &Header) -> std::io::Result<()> {
    w.write_all(MAGIC)?;
    w.write_all(&VERSION.to_le_bytes())?;
    let name_bytes = header.name.as_bytes();
    w.write_all(&(name_bytes.len() as u16).to_le_bytes())?;
    w.write_all(name_bytes)?;
    w.write_all(&header.max_key_count.to_le_bytes())?;
    w.write_all(&[header.off_heap as u8])?;
    Ok(())
}

pub fn write_entry<W: Write>(w: &mut W, entry: &Entry) -> std::io::Result<()> {
    w.write_all(&(entry.key.len() as u32).to_le_bytes())?;
    w.write_all(&entry.key)?;
    w.write_all(&(entry.value.len() as u32).to_le_bytes())?;
    w.write_all(&entry.value)?;
    w.write_all(&entry.expires_at_ms.to_le_bytes())?;
    Ok(())
}

pub fn read_header<R: Read>(r: &mut R) -> Result<Header, SnapshotError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(SnapshotError::Malformed("bad magic".to_string()));
    }
    let version = read_u16(r)?;
    if version != VERSION {
        return Err(SnapshotError::Malformed(format!("unsupported version {version}")));
    }
    let name_len = read_u16(r)? as usize;
    let mut name_buf = vec![0u8; name_len];
    r.read_exact(&mut name_buf)?;
    let name = String::from_utf8(name_buf)
        .map_err(|_| SnapshotError::Malformed("non-utf8 name".to_string()))?;
    let max_key_count = read_u64(r)?;
    let mut off_heap_byte = [0u8; 1];
    r.read_exact(&mut off_heap_byte)?;
    Ok(Header { name, max_key_count, off_heap: off_heap_byte[0] != 0 })
}

/// Reads one entry, or `None` on a clean EOF (no further record exists).
/// A short/partial record other than a clean EOF is a malformed trailing
/// record, which callers should treat as "stop reading, keep what's
/// loaded so far" rather than a hard error.
pub fn read_entry<R: Read>(r: &mut R) -> Result<Option<Entry>, SnapshotError> {
    let mut key_len_buf = [0u8; 4];
    match r.read(&mut key_len_buf)? {
        0 => return Ok(None),
        4 => {}
        _ => return Err(SnapshotError::Malformed("truncated key length".to_string())),
    }
    let key_len = u32::from_le_bytes(key_len_buf) as usize;
    let mut key = vec![0u8; key_len];
    r.read_exact(&mut key)
        .map_err(|_| SnapshotError::Malformed("truncated key".to_string()))?;
    let value_len = read_u32(r).map_err(|_| SnapshotError::Malformed("truncated value length".to_string()))? as usize;
    let mut value = vec![0u8; value_len];
    r.read_exact(&mut value)
        .map_err(|_| SnapshotError::Malformed("truncated value".to_string()))?;
    let expires_at_ms = read_u64(r).map_err(|_| SnapshotError::Malformed("truncated expiry".to_string()))?;
    Ok(Some(Entry { key: Bytes::from(key), value: Bytes::from(value), expires_at_ms }))
}

fn read_u16<R: Read>(r: &mut R) -> Result<u16, SnapshotError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, SnapshotError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> Result<u64, SnapshotError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

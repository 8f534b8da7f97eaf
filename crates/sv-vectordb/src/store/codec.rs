//! Binary encoding of record fields for the hash-field backing store.
//!
//! Vectors are packed little-endian `f32`s, the same layout a
//! `float32` array's raw bytes have on common hardware.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{Result, VectorDbError};
use crate::record::VectorRecord;
use super::kv::Fields;

pub const FIELD_VECTOR: &str = "vector";
pub const FIELD_SEQ: &str = "seq";
pub const FIELD_CONTENT: &str = "content";

pub fn encode_vector(v: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(v.len() * 4);
    for &x in v {
        buf.extend_from_slice(&x.to_le_bytes());
    }
    buf
}

pub fn decode_vector(data: &[u8]) -> Result<Vec<f32>> {
    if data.len() % 4 != 0 {
        return Err(VectorDbError::Serialization(format!(
            "vector field length {} is not a multiple of 4",
            data.len()
        )));
    }
    let mut cursor = Cursor::new(data);
    let mut out = Vec::with_capacity(data.len() / 4);
    while (cursor.position() as usize) < data.len() {
        out.push(cursor.read_f32::<LittleEndian>()?);
    }
    Ok(out)
}

pub fn encode_record(record: &VectorRecord) -> Fields {
    let mut fields = Fields::new();
    fields.insert(FIELD_VECTOR.into(), encode_vector(record.vector()));
    fields.insert(FIELD_SEQ.into(), record.seq().to_le_bytes().to_vec());
    // Always written so a replacement without text clears the old one.
    let content = record.content().unwrap_or_default();
    fields.insert(FIELD_CONTENT.into(), content.as_bytes().to_vec());
    fields
}

pub fn decode_record(id: &str, fields: &Fields) -> Result<VectorRecord> {
    let vector = fields.get(FIELD_VECTOR)
        .ok_or_else(|| VectorDbError::Storage(format!("record {id} has no vector field")))?;
    let vector = decode_vector(vector)?;
    let seq = match fields.get(FIELD_SEQ) {
        Some(raw) => Cursor::new(raw.as_slice()).read_u64::<LittleEndian>()
            .map_err(|_| VectorDbError::Storage(format!("record {id} has a malformed seq field")))?,
        None => 0,
    };
    let mut record = VectorRecord::new(id, vector).with_seq(seq);
    if let Some(raw) = fields.get(FIELD_CONTENT).filter(|raw| !raw.is_empty()) {
        let content = String::from_utf8(raw.clone())
            .map_err(|_| VectorDbError::Storage(format!("record {id} content is not UTF-8")))?;
        record = record.with_content(content);
    }
    Ok(record)
}

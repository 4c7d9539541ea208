//! The `.pfb` binary columnar format.
//!
//! Layout: a 4-byte magic, column and row counts, then one record per
//! column: name, kind tag, and an lz4-compressed block of presence-prefixed
//! little-endian values. Strings are length-prefixed UTF-8.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use plateframe_types::{Column, PlateError, PlateFrame, Result, Value, ValueKind};

const MAGIC: &[u8; 4] = b"PFB1";

const KIND_INTEGER: u8 = 0;
const KIND_FLOAT: u8 = 1;
const KIND_STR: u8 = 2;

// --- Primitive little-endian readers/writers ---

fn write_u8(w: &mut impl Write, v: u8) -> Result<()> {
    w.write_all(&[v])?;
    Ok(())
}

fn write_u64(w: &mut impl Write, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_i64(w: &mut impl Write, v: i64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f64(w: &mut impl Write, v: f64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_string(w: &mut impl Write, s: &str) -> Result<()> {
    write_u64(w, s.len() as u64)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_u8(r: &mut impl Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u64(r: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_i64(r: &mut impl Read) -> Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_f64(r: &mut impl Read) -> Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_string(r: &mut impl Read) -> Result<String> {
    let len = read_u64(r)? as usize;
    if len > 256 * 1024 * 1024 {
        return Err(PlateError::Format(format!(
            "string length {} exceeds sanity limit",
            len
        )));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| PlateError::Format(format!("invalid UTF-8: {}", e)))
}

fn kind_tag(kind: ValueKind) -> u8 {
    match kind {
        ValueKind::Integer => KIND_INTEGER,
        ValueKind::Float | ValueKind::Undefined => KIND_FLOAT,
        ValueKind::Str => KIND_STR,
    }
}

fn tag_kind(tag: u8) -> Result<ValueKind> {
    match tag {
        KIND_INTEGER => Ok(ValueKind::Integer),
        KIND_FLOAT => Ok(ValueKind::Float),
        KIND_STR => Ok(ValueKind::Str),
        other => Err(PlateError::Format(format!("unknown column kind tag {}", other))),
    }
}

/// Encode a column body: presence byte followed by the value.
fn encode_column(col: &Column) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    for i in 0..col.len() {
        match col.get(i) {
            Value::Undefined => write_u8(&mut body, 0)?,
            Value::Integer(v) => {
                write_u8(&mut body, 1)?;
                write_i64(&mut body, v)?;
            }
            Value::Float(v) => {
                write_u8(&mut body, 1)?;
                write_f64(&mut body, v)?;
            }
            Value::Str(s) => {
                write_u8(&mut body, 1)?;
                write_string(&mut body, &s)?;
            }
        }
    }
    Ok(body)
}

fn decode_column(body: &[u8], kind: ValueKind, num_rows: usize) -> Result<Column> {
    let mut cursor = body;
    let mut col = Column::empty(kind);
    for _ in 0..num_rows {
        let present = read_u8(&mut cursor)?;
        let value = if present == 0 {
            Value::Undefined
        } else {
            match kind {
                ValueKind::Integer => Value::Integer(read_i64(&mut cursor)?),
                ValueKind::Float | ValueKind::Undefined => Value::Float(read_f64(&mut cursor)?),
                ValueKind::Str => Value::Str(Arc::from(read_string(&mut cursor)?)),
            }
        };
        col.push(&value)?;
    }
    Ok(col)
}

/// Write a frame to a `.pfb` file.
pub fn write_table(path: impl AsRef<Path>, frame: &PlateFrame) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    w.write_all(MAGIC)?;
    write_u64(&mut w, frame.num_columns() as u64)?;
    write_u64(&mut w, frame.num_rows() as u64)?;

    for (name, col) in frame.column_names().iter().zip(frame.columns()) {
        write_string(&mut w, name)?;
        write_u8(&mut w, kind_tag(col.kind()))?;

        let body = encode_column(col)?;
        let compressed = lz4_flex::compress(&body);
        write_u64(&mut w, body.len() as u64)?;
        write_u64(&mut w, compressed.len() as u64)?;
        w.write_all(&compressed)?;
    }

    w.flush()?;
    Ok(())
}

/// Read a frame from a `.pfb` file.
pub fn read_table(path: impl AsRef<Path>) -> Result<PlateFrame> {
    let file = File::open(path)?;
    let mut r = BufReader::new(file);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(PlateError::Format("bad magic, not a pfb file".to_string()));
    }

    let num_columns = read_u64(&mut r)? as usize;
    let num_rows = read_u64(&mut r)? as usize;

    let mut names = Vec::with_capacity(num_columns);
    let mut columns = Vec::with_capacity(num_columns);
    for _ in 0..num_columns {
        let name = read_string(&mut r)?;
        let kind = tag_kind(read_u8(&mut r)?)?;

        let uncompressed_len = read_u64(&mut r)? as usize;
        let compressed_len = read_u64(&mut r)? as usize;
        let mut compressed = vec![0u8; compressed_len];
        r.read_exact(&mut compressed)?;
        let body = lz4_flex::decompress(&compressed, uncompressed_len)
            .map_err(|e| PlateError::Format(format!("lz4 decompression failed: {}", e)))?;

        names.push(name);
        columns.push(decode_column(&body, kind, num_rows)?);
    }

    PlateFrame::new(names, columns)
}

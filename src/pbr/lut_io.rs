// src/pbr/lut_io.rs
// Flat binary IO for precomputed lookup tables: little-endian IEEE-754 f32,
// x fastest-varying, no header. Dimensions travel by convention with the
// table's EnergyTableDesc; the round trip is bit-exact.
// RELEVANT FILES: src/pbr/energy.rs, src/error.rs

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::error::{RenderError, RenderResult};

/// Write `table` in flat order. Overwrites any existing file.
pub fn save_table<P: AsRef<Path>>(path: P, table: &[f32]) -> RenderResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for value in table {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a table of exactly `expected_len` floats. A missing file and a
/// mis-sized file are distinct typed errors so callers can decide between
/// regenerating and aborting.
pub fn load_table<P: AsRef<Path>>(path: P, expected_len: usize) -> RenderResult<Vec<f32>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RenderError::FileNotFound(path.to_path_buf()));
    }

    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    if bytes.len() != expected_len * 4 {
        return Err(RenderError::table(format!(
            "{} holds {} bytes, expected {} ({} floats)",
            path.display(),
            bytes.len(),
            expected_len * 4,
            expected_len
        )));
    }

    let mut table = Vec::with_capacity(expected_len);
    for chunk in bytes.chunks_exact(4) {
        table.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(table)
}

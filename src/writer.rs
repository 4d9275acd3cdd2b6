//! Flat binary output.
//!
//! Sample files are raw little-endian `i16` with no header, laid out
//! channel-major: all samples of channel 0, then all samples of channel 1,
//! and so on. Tools expecting interleaved `[time, channel]` frames must
//! transpose on read. Time maps are stored the same way as raw
//! little-endian `f64`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::{Array1, Array2};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::types::{SampleMatrix, TimeMap};

const IO_BUFFER_SIZE: usize = 65536;

/// Writes `matrix` to `path`, replacing any existing file.
///
/// Returns the number of bytes written.
pub fn write_sample_matrix<P: AsRef<Path>>(path: P, matrix: &SampleMatrix) -> Result<u64> {
    let path = path.as_ref();
    let file = open_fresh(path)?;
    let mut writer = BufWriter::with_capacity(IO_BUFFER_SIZE, file);

    for row in matrix.rows() {
        for &sample in row.iter() {
            writer.write_i16::<LittleEndian>(sample)?;
        }
    }
    writer.flush()?;

    let bytes = (matrix.len() * std::mem::size_of::<i16>()) as u64;
    log::info!(
        "Wrote {} channels x {} samples ({} bytes) to {}",
        matrix.nrows(),
        matrix.ncols(),
        bytes,
        path.display()
    );
    Ok(bytes)
}

/// Reads a sample file written by [`write_sample_matrix`].
pub fn read_sample_matrix<P: AsRef<Path>>(path: P, n_channels: usize) -> Result<SampleMatrix> {
    let file = File::open(path.as_ref())?;
    let len = file.metadata()?.len();

    let frame = (n_channels * std::mem::size_of::<i16>()) as u64;
    if n_channels == 0 || len % frame != 0 {
        return Err(ConvertError::InvalidBinaryLayout { len, n_channels });
    }
    let n_samples = (len / frame) as usize;

    let mut reader = BufReader::with_capacity(IO_BUFFER_SIZE, file);
    let mut samples = vec![0i16; n_channels * n_samples];
    reader.read_i16_into::<LittleEndian>(&mut samples)?;

    Array2::from_shape_vec((n_channels, n_samples), samples)
        .map_err(|_| ConvertError::InvalidBinaryLayout { len, n_channels })
}

/// Writes a time map as raw `f64`, replacing any existing file.
pub fn write_time_map<P: AsRef<Path>>(path: P, time_map: &TimeMap) -> Result<()> {
    let file = open_fresh(path.as_ref())?;
    let mut writer = BufWriter::with_capacity(IO_BUFFER_SIZE, file);
    for &t in time_map.iter() {
        writer.write_f64::<LittleEndian>(t)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a time map written by [`write_time_map`].
pub fn read_time_map<P: AsRef<Path>>(path: P) -> Result<TimeMap> {
    let file = File::open(path.as_ref())?;
    let len = file.metadata()?.len();
    let width = std::mem::size_of::<f64>() as u64;
    if len % width != 0 {
        return Err(ConvertError::InvalidBinaryLayout { len, n_channels: 1 });
    }

    let mut reader = BufReader::with_capacity(IO_BUFFER_SIZE, file);
    let mut times = vec![0f64; (len / width) as usize];
    reader.read_f64_into::<LittleEndian>(&mut times)?;
    Ok(Array1::from(times))
}

/// Deletes any existing file at `path`, then opens it for appending.
fn open_fresh(path: &Path) -> Result<File> {
    if path.exists() {
        log::debug!("Removing existing file {}", path.display());
        fs::remove_file(path)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}

//! Dense row-major vector matrix with a memory-mapped on-disk format.
//!
//! # Storage Format
//!
//! The file uses a simple binary layout optimized for sequential access:
//! - Header (20 bytes): magic `SVEC`, version (u32), dimension (u32), row count (u64)
//! - Rows: contiguous f32 arrays in little-endian format, `rows * dimension` values
//!
//! All integers are little-endian. The file length must match the header
//! exactly; anything else is reported as an invalid format.

use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::MmapOptions;
use thiserror::Error;

use crate::fsops::write_atomic;
use crate::vector::types::{VectorDimension, VectorError};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

/// Size of the storage header in bytes.
const HEADER_SIZE: usize = 20;

/// Magic bytes to identify vector matrix files.
const MAGIC_BYTES: &[u8; 4] = b"SVEC";

/// Number of bytes per f32 value.
const BYTES_PER_F32: usize = 4;

/// Errors specific to vector matrix persistence.
#[derive(Error, Debug)]
pub enum VectorStorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid storage format: {0}")]
    InvalidFormat(String),

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),
}

/// Row-major matrix of `f32` vectors sharing one dimension.
///
/// Rows are appended in arrival order and never reordered, so row `i`
/// always corresponds to the `i`-th id pushed alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatrix {
    dimension: VectorDimension,
    data: Vec<f32>,
}

impl VectorMatrix {
    /// Creates an empty matrix.
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Builds a matrix from owned rows, validating every row's length.
    pub fn from_rows<I>(dimension: VectorDimension, rows: I) -> Result<Self, VectorError>
    where
        I: IntoIterator<Item = Vec<f32>>,
    {
        let mut matrix = Self::new(dimension);
        for row in rows {
            matrix.push_row(&row)?;
        }
        Ok(matrix)
    }

    /// Appends one row.
    pub fn push_row(&mut self, row: &[f32]) -> Result<(), VectorError> {
        self.dimension.validate_vector(row)?;
        self.data.extend_from_slice(row);
        Ok(())
    }

    /// Appends every row of `other`, preserving order.
    pub fn append(&mut self, other: &VectorMatrix) -> Result<(), VectorError> {
        if other.dimension != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension.get(),
                actual: other.dimension.get(),
            });
        }
        self.data.extend_from_slice(&other.data);
        Ok(())
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.data.len() / self.dimension.get()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Returns row `index`.
    ///
    /// # Panics
    /// Panics if `index >= self.rows()`.
    #[must_use]
    pub fn row(&self, index: usize) -> &[f32] {
        let dim = self.dimension.get();
        &self.data[index * dim..(index + 1) * dim]
    }

    /// Raw row-major values.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Serializes the matrix into the on-disk format.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.data.len() * BYTES_PER_F32);
        bytes.extend_from_slice(MAGIC_BYTES);
        bytes.extend_from_slice(&STORAGE_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension.get() as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.rows() as u64).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Parses a matrix from the on-disk format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VectorStorageError> {
        let (dimension, rows) = read_header(bytes)?;

        let expected_len = rows
            .checked_mul(dimension.get())
            .and_then(|values| values.checked_mul(BYTES_PER_F32))
            .and_then(|payload| payload.checked_add(HEADER_SIZE))
            .ok_or_else(|| {
                VectorStorageError::InvalidFormat(format!(
                    "Header declares an impossible size: {rows} rows of dimension {dimension}"
                ))
            })?;

        if bytes.len() != expected_len {
            return Err(VectorStorageError::InvalidFormat(format!(
                "Expected {expected_len} bytes for {rows} rows of dimension {dimension}, found {}",
                bytes.len()
            )));
        }

        let data = bytes[HEADER_SIZE..]
            .chunks_exact(BYTES_PER_F32)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self { dimension, data })
    }

    /// Atomically writes the matrix to `path`.
    pub fn write_to(&self, path: &Path) -> Result<(), VectorStorageError> {
        write_atomic(path, &self.to_bytes())?;
        Ok(())
    }

    /// Reads a matrix previously written with [`VectorMatrix::write_to`].
    pub fn read_from(path: &Path) -> Result<Self, VectorStorageError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < HEADER_SIZE as u64 {
            return Err(VectorStorageError::InvalidFormat(
                "File too small to contain header".to_string(),
            ));
        }

        // SAFETY: checkpoint files are immutable once written; writers only
        // ever replace them through an atomic rename.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Self::from_bytes(&mmap)
    }
}

fn read_header(bytes: &[u8]) -> Result<(VectorDimension, usize), VectorStorageError> {
    if bytes.len() < HEADER_SIZE {
        return Err(VectorStorageError::InvalidFormat(
            "File too small to contain header".to_string(),
        ));
    }

    if &bytes[0..4] != MAGIC_BYTES {
        return Err(VectorStorageError::InvalidFormat(
            "Invalid magic bytes".to_string(),
        ));
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != STORAGE_VERSION {
        return Err(VectorStorageError::InvalidFormat(format!(
            "Unsupported storage version {version}, expected {STORAGE_VERSION}"
        )));
    }

    let dim_value = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let dimension = VectorDimension::new(dim_value as usize)?;

    let mut count = [0u8; 8];
    count.copy_from_slice(&bytes[12..20]);
    let rows = usize::try_from(u64::from_le_bytes(count)).map_err(|_| {
        VectorStorageError::InvalidFormat("Row count does not fit in memory".to_string())
    })?;

    Ok((dimension, rows))
}

//! Safetensors exchange of pipeline outputs.
//!
//! Dumps carry `mel` `[98, 80]` and `conv` `[96, 78]` as F64 with the frontend
//! params JSON under the `frontend` metadata key. Reference files from other
//! implementations may use F32; those are widened on load.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use memmap2::MmapOptions;
use safetensors::tensor::{Dtype, SafeTensorError, View, serialize_to_file};
use thiserror::Error;

use crate::constants::{CONV_COLS, CONV_ROWS, MEL_BINS, N_FRAMES};
use crate::params::FrontendParams;
use crate::pipeline::FeatureMaps;

pub const MEL_TENSOR: &str = "mel";
pub const CONV_TENSOR: &str = "conv";
pub const PARAMS_METADATA_KEY: &str = "frontend";

#[derive(Debug, Clone)]
pub struct TensorF64 {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

#[derive(Debug, Error)]
pub enum TensorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("safetensors error: {0}")]
    SafeTensors(#[from] SafeTensorError),
    #[error("unsupported dtype for {name}: {dtype:?}")]
    UnsupportedDtype { name: String, dtype: Dtype },
    #[error("invalid tensor byte length for {name}: got {bytes}, expected multiple of {elem_size}")]
    InvalidByteLen {
        name: String,
        bytes: usize,
        elem_size: usize,
    },
    #[error("tensor {name} has shape {got:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    #[error("invalid frontend metadata: {0}")]
    Metadata(String),
}

/// Borrowed F64 view used for serialization.
struct F64View<'a> {
    shape: Vec<usize>,
    data: &'a [f64],
}

impl View for F64View<'_> {
    fn dtype(&self) -> Dtype {
        Dtype::F64
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> Cow<'_, [u8]> {
        let mut bytes = Vec::with_capacity(self.data_len());
        for v in self.data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        Cow::Owned(bytes)
    }

    fn data_len(&self) -> usize {
        self.data.len() * std::mem::size_of::<f64>()
    }
}

/// Write both outputs to `path` as F64 safetensors.
pub fn write_feature_maps(path: impl AsRef<Path>, maps: &FeatureMaps) -> Result<(), TensorError> {
    let params_json = FrontendParams::current()
        .to_json_string()
        .map_err(|e| TensorError::Metadata(e.to_string()))?;
    let metadata = HashMap::from([(PARAMS_METADATA_KEY.to_string(), params_json)]);

    let tensors = vec![
        (
            MEL_TENSOR,
            F64View {
                shape: vec![N_FRAMES, MEL_BINS],
                data: &maps.mel[..],
            },
        ),
        (
            CONV_TENSOR,
            F64View {
                shape: vec![CONV_ROWS, CONV_COLS],
                data: &maps.conv[..],
            },
        ),
    ];
    serialize_to_file(tensors, &Some(metadata), path.as_ref())?;
    Ok(())
}

/// Memory-mapped safetensors file holding reference outputs.
#[derive(Debug)]
pub struct ReferenceStore {
    mmap: memmap2::Mmap,
}

impl ReferenceStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TensorError> {
        let file = std::fs::File::open(path)?;
        // SAFETY: read-only file mapping for immutable tensor access.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(Self { mmap })
    }

    pub fn names(&self) -> Result<Vec<String>, TensorError> {
        let st = safetensors::SafeTensors::deserialize(&self.mmap)?;
        Ok(st.iter().map(|(name, _)| name.to_string()).collect())
    }

    /// Frontend params recorded by [`write_feature_maps`], if any.
    pub fn params(&self) -> Result<Option<FrontendParams>, TensorError> {
        let (_, meta) = safetensors::SafeTensors::read_metadata(&self.mmap)?;
        let Some(json) = meta
            .metadata()
            .as_ref()
            .and_then(|m| m.get(PARAMS_METADATA_KEY))
        else {
            return Ok(None);
        };
        FrontendParams::from_json_str(json)
            .map(Some)
            .map_err(|e| TensorError::Metadata(format!("{e:#}")))
    }

    pub fn tensor_f64(&self, name: &str) -> Result<TensorF64, TensorError> {
        let st = safetensors::SafeTensors::deserialize(&self.mmap)?;
        let tv = st.tensor(name)?;
        let dtype = tv.dtype();
        let shape = tv.shape().to_vec();
        let raw = tv.data();

        let elem_size = match dtype {
            Dtype::F64 => 8,
            Dtype::F32 => 4,
            other => {
                return Err(TensorError::UnsupportedDtype {
                    name: name.to_string(),
                    dtype: other,
                });
            }
        };
        if raw.len() % elem_size != 0 {
            return Err(TensorError::InvalidByteLen {
                name: name.to_string(),
                bytes: raw.len(),
                elem_size,
            });
        }

        let data = if dtype == Dtype::F64 {
            raw.chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect()
        } else {
            raw.chunks_exact(4)
                .map(|c| f64::from(f32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                .collect()
        };

        Ok(TensorF64 { shape, data })
    }

    /// Load `mel` and `conv`, checking their shapes against this build.
    pub fn feature_maps(&self) -> Result<FeatureMaps, TensorError> {
        let mut maps = FeatureMaps::zeroed();
        let mel = self.shaped(MEL_TENSOR, &[N_FRAMES, MEL_BINS])?;
        let conv = self.shaped(CONV_TENSOR, &[CONV_ROWS, CONV_COLS])?;
        maps.mel.copy_from_slice(&mel.data);
        maps.conv.copy_from_slice(&conv.data);
        Ok(maps)
    }

    fn shaped(&self, name: &str, expected: &[usize]) -> Result<TensorF64, TensorError> {
        let t = self.tensor_f64(name)?;
        // A leading batch/channel axis of 1 is common in reference dumps.
        let squeezed: Vec<usize> = t.shape.iter().copied().skip_while(|&d| d == 1).collect();
        if squeezed != expected {
            return Err(TensorError::ShapeMismatch {
                name: name.to_string(),
                got: t.shape,
                expected: expected.to_vec(),
            });
        }
        Ok(t)
    }
}

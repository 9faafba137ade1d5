//! Safetensors I/O.
//!
//! File layouts (all little-endian):
//!
//! | file      | tensors                                                                 |
//! |-----------|-------------------------------------------------------------------------|
//! | raw       | `data [C,T]`, `sfreq [1]`, `ch_names`, `ch_types`, optional `projs [P,C]` |
//! | ICA       | `unmixing [K,C]`, `mixing [C,K]`                                        |
//! | epochs    | `data [E,C,T]`, `labels [E]` I64, `times [T]`, `sfreq [1]`, `ch_names`   |
//! | summary   | `times`, `accuracy`, `lower`, `upper`, `p_values` `[T]`, `null [T,N]`   |
//!
//! String lists are stored as one `U8` tensor of newline-joined UTF-8.
//! Float tensors may be `F32` or `F64` on read and are always `F64` on write.
use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use ndarray::{Array2, Array3};
use serde::Deserialize;

use crate::decode::DecodingOutcome;
use crate::ica::IcaSolution;
use crate::preprocess::Epochs;
use crate::raw::{ChannelType, RawRecording};

// ── Reader ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct TensorEntry {
    dtype: String,
    shape: Vec<usize>,
    data_offsets: [usize; 2],
}

/// An in-memory safetensors file.
#[derive(Debug)]
pub struct StReader {
    bytes: Vec<u8>,
    data_start: usize,
    entries: HashMap<String, TensorEntry>,
}

impl StReader {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_bytes(bytes).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        ensure!(bytes.len() >= 8, "safetensors file too small");
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[..8]);
        let n = u64::from_le_bytes(len);
        let data_start = usize::try_from(n)
            .ok()
            .and_then(|n| n.checked_add(8))
            .filter(|&end| end <= bytes.len())
            .with_context(|| format!("header length {n} exceeds file size"))?;

        let raw: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(&bytes[8..data_start]).context("failed to parse safetensors header")?;
        let mut entries = HashMap::new();
        for (name, value) in raw {
            if name == "__metadata__" {
                continue;
            }
            let entry: TensorEntry =
                serde_json::from_value(value).with_context(|| format!("bad header entry {name:?}"))?;
            let [s, e] = entry.data_offsets;
            let end = data_start.checked_add(e);
            ensure!(
                s <= e && end.is_some_and(|end| end <= bytes.len()),
                "tensor {name:?} lies outside the file"
            );
            entries.insert(name, entry);
        }
        Ok(Self { bytes, data_start, entries })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn entry(&self, name: &str) -> Result<&TensorEntry> {
        self.entries.get(name).with_context(|| format!("missing '{name}' tensor"))
    }

    fn raw_bytes(&self, entry: &TensorEntry) -> &[u8] {
        let [s, e] = entry.data_offsets;
        &self.bytes[self.data_start + s..self.data_start + e]
    }

    pub fn shape(&self, name: &str) -> Result<&[usize]> {
        Ok(&self.entry(name)?.shape)
    }

    /// Any numeric tensor, widened to `f64`.
    pub fn f64_vec(&self, name: &str) -> Result<Vec<f64>> {
        let entry = self.entry(name)?;
        let raw = self.raw_bytes(entry);
        Ok(match entry.dtype.as_str() {
            "F64" => raw.chunks_exact(8).map(|b| f64::from_le_bytes(le8(b))).collect(),
            "F32" => raw.chunks_exact(4).map(|b| f32::from_le_bytes(le4(b)) as f64).collect(),
            "I64" => raw.chunks_exact(8).map(|b| i64::from_le_bytes(le8(b)) as f64).collect(),
            "I32" => raw.chunks_exact(4).map(|b| i32::from_le_bytes(le4(b)) as f64).collect(),
            other => bail!("tensor '{name}' has non-numeric dtype {other}"),
        })
    }

    /// An integer tensor as `i64`.
    pub fn i64_vec(&self, name: &str) -> Result<Vec<i64>> {
        let entry = self.entry(name)?;
        let raw = self.raw_bytes(entry);
        Ok(match entry.dtype.as_str() {
            "I64" => raw.chunks_exact(8).map(|b| i64::from_le_bytes(le8(b))).collect(),
            "I32" => raw.chunks_exact(4).map(|b| i32::from_le_bytes(le4(b)) as i64).collect(),
            other => bail!("tensor '{name}' has dtype {other}, expected an integer type"),
        })
    }

    pub fn array2(&self, name: &str) -> Result<Array2<f64>> {
        let shape = self.shape(name)?;
        ensure!(shape.len() == 2, "tensor '{name}' has shape {shape:?}, expected 2-D");
        let dims = (shape[0], shape[1]);
        Array2::from_shape_vec(dims, self.f64_vec(name)?).with_context(|| format!("reshaping '{name}'"))
    }

    pub fn array3(&self, name: &str) -> Result<Array3<f64>> {
        let shape = self.shape(name)?;
        ensure!(shape.len() == 3, "tensor '{name}' has shape {shape:?}, expected 3-D");
        let dims = (shape[0], shape[1], shape[2]);
        Array3::from_shape_vec(dims, self.f64_vec(name)?).with_context(|| format!("reshaping '{name}'"))
    }

    pub fn scalar(&self, name: &str) -> Result<f64> {
        self.f64_vec(name)?
            .first()
            .copied()
            .with_context(|| format!("tensor '{name}' is empty"))
    }

    /// Newline-separated string list.
    pub fn strings(&self, name: &str) -> Result<Vec<String>> {
        let text = std::str::from_utf8(self.raw_bytes(self.entry(name)?))
            .with_context(|| format!("tensor '{name}' is not UTF-8"))?;
        Ok(text.split('\n').filter(|s| !s.is_empty()).map(String::from).collect())
    }
}

fn le8(b: &[u8]) -> [u8; 8] {
    let mut a = [0u8; 8];
    a.copy_from_slice(b);
    a
}

fn le4(b: &[u8]) -> [u8; 4] {
    let mut a = [0u8; 4];
    a.copy_from_slice(b);
    a
}

// ── Writer ────────────────────────────────────────────────────────────────

/// Safetensors writer for F64, I64 and string tensors.
///
/// ```rust,no_run
/// use megdec::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("signal", &[1.0, 2.0, 3.0], &[1, 3]);
/// w.add_strings("names", &["a".to_string(), "b".to_string()]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_f64_arr3(&mut self, name: &str, arr: &Array3<f64>) {
        let (a, b, c) = arr.dim();
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[a, b, c]);
    }

    pub fn add_i64(&mut self, name: &str, data: &[i64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I64", shape.to_vec()));
    }

    pub fn add_strings(&mut self, name: &str, items: &[String]) {
        let bytes = items.join("\n").into_bytes();
        let n = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![n]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

// ── Domain files ──────────────────────────────────────────────────────────

pub fn load_raw(path: &Path) -> Result<RawRecording> {
    let st = StReader::open(path)?;
    let data = st.array2("data")?;
    let sfreq = st.scalar("sfreq")?;
    let ch_names = st.strings("ch_names")?;
    let ch_types = st
        .strings("ch_types")?
        .iter()
        .map(|t| t.parse::<ChannelType>())
        .collect::<Result<Vec<_>>>()?;
    let raw = RawRecording::new(data, sfreq, ch_names, ch_types)
        .with_context(|| format!("invalid recording {}", path.display()))?;
    if st.contains("projs") {
        raw.with_projectors(st.array2("projs")?)
    } else {
        Ok(raw)
    }
}

pub fn save_raw(raw: &RawRecording, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr2("data", &raw.data);
    w.add_f64("sfreq", &[raw.sfreq], &[1]);
    w.add_strings("ch_names", &raw.ch_names);
    let types: Vec<String> = raw.ch_types.iter().map(|t| t.name().to_string()).collect();
    w.add_strings("ch_types", &types);
    if let Some(p) = &raw.projectors {
        w.add_f64_arr2("projs", p);
    }
    w.write(path)
}

pub fn load_ica(path: &Path) -> Result<IcaSolution> {
    let st = StReader::open(path)?;
    IcaSolution::new(st.array2("unmixing")?, st.array2("mixing")?)
        .with_context(|| format!("invalid ICA solution {}", path.display()))
}

pub fn save_ica(ica: &IcaSolution, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr2("unmixing", ica.unmixing());
    w.add_f64_arr2("mixing", ica.mixing());
    w.write(path)
}

pub fn load_epochs(path: &Path) -> Result<Epochs> {
    let st = StReader::open(path)?;
    let data = st.array3("data")?;
    let labels = st.i64_vec("labels")?;
    let times = st.f64_vec("times")?;
    ensure!(labels.len() == data.dim().0, "{} labels for {} epochs", labels.len(), data.dim().0);
    ensure!(times.len() == data.dim().2, "{} times for {} samples", times.len(), data.dim().2);
    let ch_names = if st.contains("ch_names") { st.strings("ch_names")? } else { vec![] };
    let sfreq = if st.contains("sfreq") {
        st.scalar("sfreq")?
    } else if times.len() > 1 {
        1.0 / (times[1] - times[0])
    } else {
        0.0
    };
    Ok(Epochs { data, labels, times, ch_names, sfreq, n_rejected: 0 })
}

pub fn save_epochs(epochs: &Epochs, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr3("data", &epochs.data);
    w.add_i64("labels", &epochs.labels, &[epochs.labels.len()]);
    w.add_f64("times", &epochs.times, &[epochs.times.len()]);
    w.add_f64("sfreq", &[epochs.sfreq], &[1]);
    w.add_strings("ch_names", &epochs.ch_names);
    w.write(path)
}

pub fn save_outcome(outcome: &DecodingOutcome, path: &Path) -> Result<()> {
    let s = &outcome.summary;
    let n = s.len();
    let mut w = StWriter::new();
    w.add_f64("times", &s.times, &[n]);
    w.add_f64("accuracy", &s.accuracy, &[n]);
    w.add_f64("lower", &s.lower, &[n]);
    w.add_f64("upper", &s.upper, &[n]);
    w.add_f64("p_values", &s.p_values, &[n]);
    w.add_f64_arr2("null", &outcome.null_distribution);
    w.write(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_every_dtype() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.safetensors");
        let mut w = StWriter::new();
        w.add_f64("x", &[1.5, -2.0], &[2]);
        w.add_i64("y", &[11, 1121], &[2]);
        w.add_strings("s", &["MEG 0111".into(), "STI 101".into()]);
        w.write(&path).unwrap();

        let st = StReader::open(&path).unwrap();
        assert_eq!(st.f64_vec("x").unwrap(), vec![1.5, -2.0]);
        assert_eq!(st.i64_vec("y").unwrap(), vec![11, 1121]);
        assert_eq!(st.f64_vec("y").unwrap(), vec![11.0, 1121.0]);
        assert_eq!(st.strings("s").unwrap(), vec!["MEG 0111", "STI 101"]);
        assert!(st.i64_vec("x").is_err());
        assert!(st.f64_vec("missing").is_err());
    }

    #[test]
    fn f32_tensors_are_widened() {
        // Hand-built file with one F32 tensor and a metadata entry.
        let header = br#"{"__metadata__":{"k":"v"},"a":{"dtype":"F32","shape":[2],"data_offsets":[0,8]}}"#;
        let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
        bytes.extend_from_slice(header);
        bytes.extend(0.5f32.to_le_bytes());
        bytes.extend(4.0f32.to_le_bytes());
        let st = StReader::from_bytes(bytes).unwrap();
        assert_eq!(st.f64_vec("a").unwrap(), vec![0.5, 4.0]);
    }

    #[test]
    fn truncated_files_are_rejected() {
        assert!(StReader::from_bytes(vec![1, 2, 3]).is_err());
        let mut bytes = 100u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        assert!(StReader::from_bytes(bytes).is_err());
    }

    #[test]
    fn oversized_lengths_do_not_overflow() {
        let mut bytes = u64::MAX.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        assert!(StReader::from_bytes(bytes).is_err());

        let header = format!(
            r#"{{"a":{{"dtype":"F64","shape":[1],"data_offsets":[0,{}]}}}}"#,
            usize::MAX
        );
        let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend(1.0f64.to_le_bytes());
        let err = StReader::from_bytes(bytes).unwrap_err();
        assert!(err.to_string().contains("outside the file"), "{err}");
    }
}

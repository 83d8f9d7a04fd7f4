//! Minimal NPZ container support.
//!
//! An NPZ file is a ZIP archive of NPY members. Evaluation archives are
//! written uncompressed, so this module implements exactly that profile:
//! stored (method 0) ZIP entries holding NPY version 1.0 arrays in
//! little-endian C order. Anything else is rejected with a clear error
//! rather than silently misread.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::TelemetryError;

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_SIG: u32 = 0x0605_4b50;
const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Typed payload of one NPY member.
#[derive(Clone, Debug, PartialEq)]
pub enum NpyData {
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// One array: its shape and elements in row-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: NpyData,
}

impl NpyArray {
    #[must_use]
    pub fn vector_i64(values: Vec<i64>) -> Self {
        Self {
            shape: vec![values.len()],
            data: NpyData::I64(values),
        }
    }

    #[must_use]
    pub fn vector_f64(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            data: NpyData::F64(values),
        }
    }

    #[must_use]
    pub fn matrix_f64(rows: usize, cols: usize, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), rows * cols);
        Self {
            shape: vec![rows, cols],
            data: NpyData::F64(values),
        }
    }

    /// Total element count.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.data {
            NpyData::I32(v) => v.len(),
            NpyData::I64(v) => v.len(),
            NpyData::F32(v) => v.len(),
            NpyData::F64(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn to_f64(&self) -> Vec<f64> {
        match &self.data {
            NpyData::I32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            NpyData::I64(v) => v.iter().map(|&x| x as f64).collect(),
            NpyData::F32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            NpyData::F64(v) => v.clone(),
        }
    }

    #[must_use]
    pub fn to_i64(&self) -> Vec<i64> {
        match &self.data {
            NpyData::I32(v) => v.iter().map(|&x| i64::from(x)).collect(),
            NpyData::I64(v) => v.clone(),
            NpyData::F32(v) => v.iter().map(|&x| x as i64).collect(),
            NpyData::F64(v) => v.iter().map(|&x| x as i64).collect(),
        }
    }

    fn descr(&self) -> &'static str {
        match &self.data {
            NpyData::I32(_) => "<i4",
            NpyData::I64(_) => "<i8",
            NpyData::F32(_) => "<f4",
            NpyData::F64(_) => "<f8",
        }
    }

    fn payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match &self.data {
            NpyData::I32(v) => {
                for x in v {
                    out.extend_from_slice(&x.to_le_bytes());
                }
            }
            NpyData::I64(v) => {
                for x in v {
                    out.extend_from_slice(&x.to_le_bytes());
                }
            }
            NpyData::F32(v) => {
                for x in v {
                    out.extend_from_slice(&x.to_le_bytes());
                }
            }
            NpyData::F64(v) => {
                for x in v {
                    out.extend_from_slice(&x.to_le_bytes());
                }
            }
        }
        out
    }
}

/// A parsed NPZ archive, keyed by member name without the `.npy` suffix.
#[derive(Clone, Debug, Default)]
pub struct NpzArchive {
    entries: Vec<(String, NpyArray)>,
}

impl NpzArchive {
    pub fn read(path: &Path) -> Result<Self, TelemetryError> {
        let bytes = fs::read(path).map_err(|source| TelemetryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&bytes).map_err(|detail| TelemetryError::Archive {
            path: path.to_path_buf(),
            detail,
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NpyArray> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, array)| array)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    fn parse(bytes: &[u8]) -> Result<Self, String> {
        let eocd = find_end_of_central(bytes).ok_or("no end-of-central-directory record")?;
        let entry_count = u16_at(bytes, eocd + 10).ok_or("truncated archive")?;
        let mut cursor = u32_at(bytes, eocd + 16).ok_or("truncated archive")? as usize;

        let mut entries = Vec::new();
        for _ in 0..entry_count {
            if u32_at(bytes, cursor) != Some(CENTRAL_HEADER_SIG) {
                return Err("central directory entry out of place".into());
            }
            let method = u16_at(bytes, cursor + 10).ok_or("truncated central entry")?;
            let crc = u32_at(bytes, cursor + 16).ok_or("truncated central entry")?;
            let compressed = u32_at(bytes, cursor + 20).ok_or("truncated central entry")? as usize;
            let name_len = u16_at(bytes, cursor + 28).ok_or("truncated central entry")? as usize;
            let extra_len = u16_at(bytes, cursor + 30).ok_or("truncated central entry")? as usize;
            let comment_len = u16_at(bytes, cursor + 32).ok_or("truncated central entry")? as usize;
            let local_offset =
                u32_at(bytes, cursor + 42).ok_or("truncated central entry")? as usize;

            let name_bytes = bytes
                .get(cursor + 46..cursor + 46 + name_len)
                .ok_or("truncated entry name")?;
            let name = std::str::from_utf8(name_bytes)
                .map_err(|_| "entry name is not UTF-8".to_string())?
                .to_string();

            if method != 0 {
                return Err(format!(
                    "entry `{name}` is compressed (method {method}); only stored archives are supported"
                ));
            }

            let data = entry_data(bytes, local_offset, compressed)
                .ok_or_else(|| format!("entry `{name}` is truncated"))?;
            if crc32(data) != crc {
                return Err(format!("entry `{name}` failed its checksum"));
            }

            if let Some(stem) = name.strip_suffix(".npy") {
                let array =
                    parse_npy(data).map_err(|detail| format!("entry `{name}`: {detail}"))?;
                entries.push((stem.to_string(), array));
            }

            cursor += 46 + name_len + extra_len + comment_len;
        }

        Ok(Self { entries })
    }
}

/// Writes `entries` as an uncompressed NPZ archive.
pub fn write(path: &Path, entries: &[(&str, &NpyArray)]) -> Result<(), TelemetryError> {
    let mut out = Vec::new();
    let mut central = Vec::new();

    for (name, array) in entries {
        let file_name = format!("{name}.npy");
        let payload = encode_npy(array);
        let crc = crc32(&payload);
        let size = payload.len() as u32;
        let offset = out.len() as u32;

        out.extend_from_slice(&LOCAL_HEADER_SIG.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&[0; 8]); // flags, method, mod time, mod date
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&(file_name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(file_name.as_bytes());
        out.extend_from_slice(&payload);

        central.extend_from_slice(&CENTRAL_HEADER_SIG.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&[0; 8]); // flags, method, mod time, mod date
        central.extend_from_slice(&crc.to_le_bytes());
        central.extend_from_slice(&size.to_le_bytes());
        central.extend_from_slice(&size.to_le_bytes());
        central.extend_from_slice(&(file_name.len() as u16).to_le_bytes());
        central.extend_from_slice(&[0; 12]); // extra, comment, disk, attributes
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(file_name.as_bytes());
    }

    let central_offset = out.len() as u32;
    let central_size = central.len() as u32;
    out.extend_from_slice(&central);
    out.extend_from_slice(&END_OF_CENTRAL_SIG.to_le_bytes());
    out.extend_from_slice(&[0; 4]); // disk numbers
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&central_size.to_le_bytes());
    out.extend_from_slice(&central_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());

    fs::write(path, out).map_err(|source| TelemetryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn find_end_of_central(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < 22 {
        return None;
    }
    // The record sits at the end of the file, possibly followed by a
    // comment of up to 64 KiB. Scan backward for its signature.
    let floor = bytes.len().saturating_sub(22 + u16::MAX as usize);
    (floor..=bytes.len() - 22)
        .rev()
        .find(|&i| u32_at(bytes, i) == Some(END_OF_CENTRAL_SIG))
}

fn entry_data(bytes: &[u8], local_offset: usize, size: usize) -> Option<&[u8]> {
    if u32_at(bytes, local_offset) != Some(LOCAL_HEADER_SIG) {
        return None;
    }
    let name_len = u16_at(bytes, local_offset + 26)? as usize;
    let extra_len = u16_at(bytes, local_offset + 28)? as usize;
    let start = local_offset + 30 + name_len + extra_len;
    bytes.get(start..start + size)
}

fn parse_npy(bytes: &[u8]) -> Result<NpyArray, String> {
    if bytes.get(..6) != Some(NPY_MAGIC.as_slice()) {
        return Err("missing NPY magic".into());
    }
    let major = *bytes.get(6).ok_or("truncated NPY header")?;
    if major != 1 {
        return Err(format!("unsupported NPY format version {major}"));
    }
    let header_len = u16_at(bytes, 8).ok_or("truncated NPY header")? as usize;
    let header = bytes
        .get(10..10 + header_len)
        .ok_or("truncated NPY header")?;
    let header = std::str::from_utf8(header).map_err(|_| "NPY header is not UTF-8".to_string())?;

    let descr = dict_str(header, "descr").ok_or("NPY header lacks a descr")?;
    let fortran = dict_raw(header, "fortran_order")
        .map(|v| v.starts_with("True"))
        .ok_or("NPY header lacks fortran_order")?;
    if fortran {
        return Err("Fortran-order arrays are not supported".into());
    }
    let shape = dict_shape(header).ok_or("NPY header lacks a shape")?;

    let count: usize = shape.iter().product();
    let data = &bytes[10 + header_len..];

    let array = match descr.as_str() {
        "<i4" => NpyData::I32(read_elems(data, count, i32::from_le_bytes)?),
        "<i8" => NpyData::I64(read_elems(data, count, i64::from_le_bytes)?),
        "<f4" => NpyData::F32(read_elems(data, count, f32::from_le_bytes)?),
        "<f8" => NpyData::F64(read_elems(data, count, f64::from_le_bytes)?),
        other => return Err(format!("unsupported dtype `{other}`")),
    };

    Ok(NpyArray { shape, data: array })
}

fn read_elems<T, const N: usize>(
    data: &[u8],
    count: usize,
    decode: fn([u8; N]) -> T,
) -> Result<Vec<T>, String> {
    if data.len() != count * N {
        return Err(format!(
            "expected {} data bytes, found {}",
            count * N,
            data.len()
        ));
    }
    Ok(data
        .chunks_exact(N)
        .map(|chunk| {
            let mut raw = [0u8; N];
            raw.copy_from_slice(chunk);
            decode(raw)
        })
        .collect())
}

/// Extracts the raw token following `'key':` in a header dict.
fn dict_raw<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let marker = format!("'{key}':");
    let start = header.find(&marker)? + marker.len();
    Some(header[start..].trim_start())
}

fn dict_str(header: &str, key: &str) -> Option<String> {
    let rest = dict_raw(header, key)?;
    let rest = rest.strip_prefix('\'')?;
    let end = rest.find('\'')?;
    Some(rest[..end].to_string())
}

fn dict_shape(header: &str) -> Option<Vec<usize>> {
    let rest = dict_raw(header, "shape")?;
    let rest = rest.strip_prefix('(')?;
    let end = rest.find(')')?;
    let mut shape = Vec::new();
    for part in rest[..end].split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        shape.push(part.parse().ok()?);
    }
    Some(shape)
}

fn encode_npy(array: &NpyArray) -> Vec<u8> {
    let mut shape = String::new();
    for (i, dim) in array.shape.iter().enumerate() {
        if i > 0 {
            shape.push_str(", ");
        }
        let _ = write!(shape, "{dim}");
    }
    if array.shape.len() == 1 {
        shape.push(',');
    }
    let dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': ({shape}), }}",
        array.descr()
    );

    // Pad so the data section starts on a 64-byte boundary.
    let unpadded = 10 + dict.len() + 1;
    let padding = (64 - unpadded % 64) % 64;

    let mut out = Vec::new();
    out.extend_from_slice(NPY_MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&((dict.len() + padding + 1) as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.resize(out.len() + padding, b' ');
    out.push(b'\n');
    out.extend_from_slice(&array.payload());
    out
}

fn u16_at(bytes: &[u8], at: usize) -> Option<u16> {
    let raw = bytes.get(at..at + 2)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

fn u32_at(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

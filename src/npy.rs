//! NumPy `.npy` codec for sample matrices and structured index arrays.
//!
//! Reads format versions 1.0, 2.0 and 3.0 and writes version 1.0 (2.0 when the
//! header does not fit a 16-bit length). Sample arrays are converted to `f64`;
//! index arrays are stored column by column as `i64` with each field's dtype
//! kept for writing and compatibility checks.

use crate::error::{PresamplesError, Result};
use std::fmt;
use std::fs;
use std::path::Path;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const HEADER_ALIGNMENT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Int,
    UInt,
    Float,
}

/// A single numeric dtype such as `<u4` or `<f8`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarType {
    pub kind: ScalarKind,
    pub size: usize,
    pub order: ByteOrder,
}

impl ScalarType {
    pub const BOOL: ScalarType = ScalarType::new(ScalarKind::Bool, 1);
    pub const U8: ScalarType = ScalarType::new(ScalarKind::UInt, 1);
    pub const U32: ScalarType = ScalarType::new(ScalarKind::UInt, 4);
    pub const U64: ScalarType = ScalarType::new(ScalarKind::UInt, 8);
    pub const I32: ScalarType = ScalarType::new(ScalarKind::Int, 4);
    pub const I64: ScalarType = ScalarType::new(ScalarKind::Int, 8);
    pub const F32: ScalarType = ScalarType::new(ScalarKind::Float, 4);
    pub const F64: ScalarType = ScalarType::new(ScalarKind::Float, 8);

    /// Native little-endian type, with `|` byte order for single bytes
    pub const fn new(kind: ScalarKind, size: usize) -> Self {
        let order = if size == 1 {
            ByteOrder::NotApplicable
        } else {
            ByteOrder::Little
        };
        Self { kind, size, order }
    }

    /// Parse a descr string like `<u4`, `|b1` or `>f8`
    pub fn parse(descr: &str) -> Option<Self> {
        let mut chars = descr.chars();
        let order = match chars.next()? {
            '<' => ByteOrder::Little,
            '>' => ByteOrder::Big,
            '|' => ByteOrder::NotApplicable,
            '=' => {
                if cfg!(target_endian = "big") {
                    ByteOrder::Big
                } else {
                    ByteOrder::Little
                }
            }
            _ => return None,
        };
        let kind = match chars.next()? {
            'b' => ScalarKind::Bool,
            'i' => ScalarKind::Int,
            'u' => ScalarKind::UInt,
            'f' => ScalarKind::Float,
            _ => return None,
        };
        let size: usize = chars.as_str().parse().ok()?;
        let supported = match kind {
            ScalarKind::Bool => size == 1,
            ScalarKind::Int | ScalarKind::UInt => matches!(size, 1 | 2 | 4 | 8),
            ScalarKind::Float => matches!(size, 4 | 8),
        };
        if !supported {
            return None;
        }
        let order = if size == 1 {
            ByteOrder::NotApplicable
        } else if order == ByteOrder::NotApplicable {
            return None;
        } else {
            order
        };
        Some(Self { kind, size, order })
    }

    /// Same kind and width with the byte order used when writing
    pub fn normalized(self) -> Self {
        Self::new(self.kind, self.size)
    }

    pub fn descr(&self) -> String {
        let order = match self.order {
            ByteOrder::Little => '<',
            ByteOrder::Big => '>',
            ByteOrder::NotApplicable => '|',
        };
        let kind = match self.kind {
            ScalarKind::Bool => 'b',
            ScalarKind::Int => 'i',
            ScalarKind::UInt => 'u',
            ScalarKind::Float => 'f',
        };
        format!("{order}{kind}{}", self.size)
    }

    /// Short name as written into `datapackage.json`
    pub fn name(&self) -> String {
        match self.kind {
            ScalarKind::Bool => "bool".to_string(),
            ScalarKind::Int => format!("int{}", self.size * 8),
            ScalarKind::UInt => format!("uint{}", self.size * 8),
            ScalarKind::Float => format!("float{}", self.size * 8),
        }
    }

    fn bytes<const N: usize>(&self, raw: &[u8]) -> [u8; N] {
        let mut buf = [0u8; N];
        buf.copy_from_slice(&raw[..N]);
        if self.order == ByteOrder::Big {
            buf.reverse();
        }
        buf
    }

    fn read_f64(&self, raw: &[u8]) -> f64 {
        match (self.kind, self.size) {
            (ScalarKind::Float, 4) => f64::from(f32::from_le_bytes(self.bytes::<4>(raw))),
            (ScalarKind::Float, _) => f64::from_le_bytes(self.bytes::<8>(raw)),
            // Integer samples are rare but valid
            _ => self.read_i128(raw) as f64,
        }
    }

    fn read_i128(&self, raw: &[u8]) -> i128 {
        match (self.kind, self.size) {
            (ScalarKind::Bool, _) => i128::from(raw[0] != 0),
            (ScalarKind::Int, 1) => i128::from(raw[0] as i8),
            (ScalarKind::Int, 2) => i128::from(i16::from_le_bytes(self.bytes::<2>(raw))),
            (ScalarKind::Int, 4) => i128::from(i32::from_le_bytes(self.bytes::<4>(raw))),
            (ScalarKind::Int, _) => i128::from(i64::from_le_bytes(self.bytes::<8>(raw))),
            (ScalarKind::UInt, 1) => i128::from(raw[0]),
            (ScalarKind::UInt, 2) => i128::from(u16::from_le_bytes(self.bytes::<2>(raw))),
            (ScalarKind::UInt, 4) => i128::from(u32::from_le_bytes(self.bytes::<4>(raw))),
            (ScalarKind::UInt, _) => i128::from(u64::from_le_bytes(self.bytes::<8>(raw))),
            (ScalarKind::Float, _) => self.read_f64(raw) as i128,
        }
    }

    /// Range of integers representable by this type
    fn integer_bounds(&self) -> (i128, i128) {
        let bits = (self.size * 8) as u32;
        match self.kind {
            ScalarKind::Bool => (0, 1),
            ScalarKind::UInt => (0, (1i128 << bits) - 1),
            ScalarKind::Int => (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1),
            ScalarKind::Float => (i128::MIN, i128::MAX),
        }
    }

    fn write_i64(&self, value: i64, out: &mut Vec<u8>) -> std::result::Result<(), String> {
        let (low, high) = self.integer_bounds();
        if i128::from(value) < low || i128::from(value) > high {
            return Err(format!("value {value} does not fit dtype {}", self.descr()));
        }
        match (self.kind, self.size) {
            (ScalarKind::Float, _) => self.write_f64(value as f64, out),
            (_, 1) => out.push(value as u8),
            (_, 2) => out.extend_from_slice(&(value as u16).to_le_bytes()),
            (_, 4) => out.extend_from_slice(&(value as u32).to_le_bytes()),
            _ => out.extend_from_slice(&(value as u64).to_le_bytes()),
        }
        Ok(())
    }

    fn write_f64(&self, value: f64, out: &mut Vec<u8>) {
        match self.size {
            4 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            _ => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descr())
    }
}

/// One named column of a structured dtype
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordField {
    pub name: String,
    pub dtype: ScalarType,
}

impl RecordField {
    pub fn new(name: impl Into<String>, dtype: ScalarType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dtype {
    Scalar(ScalarType),
    Record(Vec<RecordField>),
}

impl Dtype {
    pub fn itemsize(&self) -> usize {
        match self {
            Dtype::Scalar(scalar) => scalar.size,
            Dtype::Record(fields) => fields.iter().map(|f| f.dtype.size).sum(),
        }
    }

    fn descr_literal(&self) -> String {
        match self {
            Dtype::Scalar(scalar) => format!("'{}'", scalar.descr()),
            Dtype::Record(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|f| format!("('{}', '{}')", f.name, f.dtype.descr()))
                    .collect();
                format!("[{}]", parts.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    pub dtype: Dtype,
    pub fortran_order: bool,
    pub shape: Vec<usize>,
}

impl NpyHeader {
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    fn to_literal(&self) -> String {
        let shape = match self.shape.as_slice() {
            [single] => format!("({single},)"),
            dims => format!(
                "({})",
                dims.iter()
                    .map(usize::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        format!(
            "{{'descr': {}, 'fortran_order': {}, 'shape': {}, }}",
            self.dtype.descr_literal(),
            if self.fortran_order { "True" } else { "False" },
            shape
        )
    }
}

/// Values of the Python literal subset used in npy headers
#[derive(Debug, Clone, PartialEq)]
enum PyLiteral {
    Str(String),
    Int(i64),
    Bool(bool),
    None,
    Seq(Vec<PyLiteral>),
    Dict(Vec<(PyLiteral, PyLiteral)>),
}

struct LiteralParser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn parse(mut self) -> std::result::Result<PyLiteral, String> {
        let value = self.value()?;
        self.skip_whitespace();
        if self.pos != self.src.len() {
            return Err(format!("trailing characters at offset {}", self.pos));
        }
        Ok(value)
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.src.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> std::result::Result<(), String> {
        match self.peek() {
            Some(found) if found == byte => {
                self.pos += 1;
                Ok(())
            }
            other => Err(format!(
                "expected '{}' at offset {}, found {:?}",
                byte as char,
                self.pos,
                other.map(char::from)
            )),
        }
    }

    fn value(&mut self) -> std::result::Result<PyLiteral, String> {
        match self.peek() {
            Some(b'{') => self.dict(),
            Some(b'(') => self.seq(b')'),
            Some(b'[') => self.seq(b']'),
            Some(quote @ (b'\'' | b'"')) => self.string(quote),
            Some(b'-' | b'0'..=b'9') => self.int(),
            Some(_) => self.word(),
            None => Err("unexpected end of header".to_string()),
        }
    }

    fn dict(&mut self) -> std::result::Result<PyLiteral, String> {
        self.expect(b'{')?;
        let mut entries = Vec::new();
        loop {
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(PyLiteral::Dict(entries));
            }
            let key = self.value()?;
            self.expect(b':')?;
            let value = self.value()?;
            entries.push((key, value));
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                other => {
                    return Err(format!(
                        "expected ',' or '}}' in dict, found {:?}",
                        other.map(char::from)
                    ))
                }
            }
        }
    }

    fn seq(&mut self, close: u8) -> std::result::Result<PyLiteral, String> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(PyLiteral::Seq(items));
            }
            items.push(self.value()?);
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(found) if found == close => {}
                other => {
                    return Err(format!(
                        "expected ',' or '{}' in sequence, found {:?}",
                        close as char,
                        other.map(char::from)
                    ))
                }
            }
        }
    }

    fn string(&mut self, quote: u8) -> std::result::Result<PyLiteral, String> {
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.src.len() && self.src[self.pos] != quote {
            self.pos += 1;
        }
        if self.pos >= self.src.len() {
            return Err("unterminated string".to_string());
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|e| format!("invalid UTF-8 in string: {e}"))?
            .to_string();
        self.pos += 1;
        Ok(PyLiteral::Str(text))
    }

    fn int(&mut self) -> std::result::Result<PyLiteral, String> {
        let start = self.pos;
        if self.src[self.pos] == b'-' {
            self.pos += 1;
        }
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        // Python 2 era headers may carry a long suffix
        let digits = std::str::from_utf8(&self.src[start..self.pos]).map_err(|e| e.to_string())?;
        if self.pos < self.src.len() && self.src[self.pos] == b'L' {
            self.pos += 1;
        }
        digits
            .parse()
            .map(PyLiteral::Int)
            .map_err(|e| format!("invalid integer '{digits}': {e}"))
    }

    fn word(&mut self) -> std::result::Result<PyLiteral, String> {
        let start = self.pos;
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_alphabetic() {
            self.pos += 1;
        }
        match &self.src[start..self.pos] {
            b"True" => Ok(PyLiteral::Bool(true)),
            b"False" => Ok(PyLiteral::Bool(false)),
            b"None" => Ok(PyLiteral::None),
            other => Err(format!(
                "unexpected token '{}'",
                String::from_utf8_lossy(other)
            )),
        }
    }
}

fn parse_header(text: &str) -> std::result::Result<NpyHeader, String> {
    let PyLiteral::Dict(entries) = LiteralParser::new(text.trim()).parse()? else {
        return Err("header is not a dict".to_string());
    };
    let lookup = |name: &str| {
        entries
            .iter()
            .find(|(key, _)| matches!(key, PyLiteral::Str(k) if k == name))
            .map(|(_, value)| value)
    };

    let dtype = match lookup("descr") {
        Some(PyLiteral::Str(descr)) => Dtype::Scalar(
            ScalarType::parse(descr).ok_or_else(|| format!("unsupported dtype '{descr}'"))?,
        ),
        Some(PyLiteral::Seq(fields)) => Dtype::Record(parse_record_fields(fields)?),
        _ => return Err("missing or invalid 'descr'".to_string()),
    };
    let fortran_order = match lookup("fortran_order") {
        Some(PyLiteral::Bool(flag)) => *flag,
        _ => return Err("missing or invalid 'fortran_order'".to_string()),
    };
    let shape = match lookup("shape") {
        Some(PyLiteral::Seq(dims)) => dims
            .iter()
            .map(|dim| match dim {
                PyLiteral::Int(n) if *n >= 0 => Ok(*n as usize),
                other => Err(format!("invalid shape dimension {other:?}")),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?,
        _ => return Err("missing or invalid 'shape'".to_string()),
    };

    Ok(NpyHeader {
        dtype,
        fortran_order,
        shape,
    })
}

fn parse_record_fields(fields: &[PyLiteral]) -> std::result::Result<Vec<RecordField>, String> {
    fields
        .iter()
        .map(|field| match field {
            PyLiteral::Seq(parts) => match parts.as_slice() {
                [PyLiteral::Str(name), PyLiteral::Str(descr)] => {
                    let dtype = ScalarType::parse(descr)
                        .ok_or_else(|| format!("unsupported dtype '{descr}' for field '{name}'"))?;
                    Ok(RecordField::new(name.clone(), dtype))
                }
                _ => Err(format!("unsupported record field {field:?}")),
            },
            _ => Err(format!("unsupported record field {field:?}")),
        })
        .collect()
}

/// Split a raw npy file into its header and data payload
fn decode(path: &Path, raw: &[u8]) -> Result<(NpyHeader, usize)> {
    if raw.len() < 10 || &raw[..6] != MAGIC {
        return Err(PresamplesError::npy(path, "missing npy magic string"));
    }
    let major = raw[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([raw[8], raw[9]]) as usize, 10),
        2 | 3 => {
            if raw.len() < 12 {
                return Err(PresamplesError::npy(path, "truncated header length"));
            }
            (
                u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]) as usize,
                12,
            )
        }
        other => {
            return Err(PresamplesError::npy(
                path,
                format!("unsupported format version {other}.{}", raw[7]),
            ))
        }
    };
    let data_start = header_start + header_len;
    if raw.len() < data_start {
        return Err(PresamplesError::npy(path, "truncated header"));
    }
    let text = std::str::from_utf8(&raw[header_start..data_start])
        .map_err(|e| PresamplesError::npy(path, format!("header is not UTF-8: {e}")))?;
    let header = parse_header(text).map_err(|reason| PresamplesError::npy(path, reason))?;

    let expected = header
        .shape
        .iter()
        .try_fold(header.dtype.itemsize(), |acc, dim| acc.checked_mul(*dim))
        .ok_or_else(|| PresamplesError::npy(path, format!("shape {:?} is too large", header.shape)))?;
    if raw.len() - data_start < expected {
        return Err(PresamplesError::npy(
            path,
            format!(
                "truncated data: expected {expected} bytes, found {}",
                raw.len() - data_start
            ),
        ));
    }
    Ok((header, data_start))
}

fn encode(header: &NpyHeader, payload: &[u8]) -> Vec<u8> {
    let literal = header.to_literal();
    // magic + version + length field + literal + newline, padded to the alignment
    let (version, length_bytes) = if literal.len() + HEADER_ALIGNMENT < u16::MAX as usize {
        (1u8, 2usize)
    } else {
        (2u8, 4usize)
    };
    let unpadded = MAGIC.len() + 2 + length_bytes + literal.len() + 1;
    let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
    let header_len = literal.len() + padding + 1;

    let mut out = Vec::with_capacity(unpadded + padding + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(version);
    out.push(0);
    if version == 1 {
        out.extend_from_slice(&(header_len as u16).to_le_bytes());
    } else {
        out.extend_from_slice(&(header_len as u32).to_le_bytes());
    }
    out.extend_from_slice(literal.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');
    out.extend_from_slice(payload);
    out
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| PresamplesError::io(path, e))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).map_err(|e| PresamplesError::io(path, e))
}

/// Dense row-major matrix of samples: one row per matrix element, one column per sample
#[derive(Debug, Clone, PartialEq)]
pub struct SampleArray {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl SampleArray {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows * cols != data.len() {
            return Err(PresamplesError::ShapeMismatch(format!(
                "sample array of shape ({rows}, {cols}) needs {} values, got {}",
                rows * cols,
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from nested rows, which must all have the same length
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|row| row.len() != cols) {
            return Err(PresamplesError::ShapeMismatch(format!(
                "row {bad} has {} columns, expected {cols}",
                rows[bad].len()
            )));
        }
        let count = rows.len();
        Self::new(count, cols, rows.into_iter().flatten().collect())
    }

    /// Same value in every cell
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        (row < self.rows).then(|| &self.data[row * self.cols..(row + 1) * self.cols])
    }

    /// Append column `col` to `out`
    pub fn extend_with_column(&self, col: usize, out: &mut Vec<f64>) {
        out.extend((0..self.rows).map(|row| self.data[row * self.cols + col]));
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = read_file(path)?;
        let (header, offset) = decode(path, &raw)?;
        let Dtype::Scalar(scalar) = header.dtype else {
            return Err(PresamplesError::npy(path, "samples must have a numeric dtype"));
        };
        let (rows, cols) = match header.shape.as_slice() {
            [n] => (*n, 1),
            [r, c] => (*r, *c),
            dims => {
                return Err(PresamplesError::npy(
                    path,
                    format!("samples must be 1- or 2-dimensional, got shape {dims:?}"),
                ))
            }
        };

        let values: Vec<f64> = raw[offset..offset + rows * cols * scalar.size]
            .chunks_exact(scalar.size)
            .map(|chunk| scalar.read_f64(chunk))
            .collect();
        let data = if header.fortran_order && rows > 1 && cols > 1 {
            let mut transposed = vec![0.0; values.len()];
            for col in 0..cols {
                for row in 0..rows {
                    transposed[row * cols + col] = values[col * rows + row];
                }
            }
            transposed
        } else {
            values
        };
        Ok(Self { rows, cols, data })
    }

    /// Write as a little-endian float64 2-D array
    pub fn write(&self, path: &Path) -> Result<()> {
        let header = NpyHeader {
            dtype: Dtype::Scalar(ScalarType::F64),
            fortran_order: false,
            shape: vec![self.rows, self.cols],
        };
        let mut payload = Vec::with_capacity(self.data.len() * 8);
        for value in &self.data {
            ScalarType::F64.write_f64(*value, &mut payload);
        }
        write_file(path, &encode(&header, &payload))
    }
}

/// One-dimensional structured array stored column by column
#[derive(Debug, Clone, PartialEq)]
pub struct IndexArray {
    fields: Vec<RecordField>,
    columns: Vec<Vec<i64>>,
}

impl IndexArray {
    pub fn new(fields: Vec<RecordField>) -> Self {
        let columns = vec![Vec::new(); fields.len()];
        Self { fields, columns }
    }

    pub fn from_records(fields: Vec<RecordField>, records: &[Vec<i64>]) -> Result<Self> {
        let mut array = Self::new(fields);
        for record in records {
            array.push(record)?;
        }
        Ok(array)
    }

    pub fn push(&mut self, record: &[i64]) -> Result<()> {
        if record.len() != self.fields.len() {
            return Err(PresamplesError::ShapeMismatch(format!(
                "record has {} values but the index dtype has {} fields",
                record.len(),
                self.fields.len()
            )));
        }
        for (column, value) in self.columns.iter_mut().zip(record) {
            column.push(*value);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    pub fn dtype(&self) -> Dtype {
        Dtype::Record(self.fields.clone())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&[i64]> {
        self.position(name).map(|i| self.columns[i].as_slice())
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut [i64]> {
        self.position(name).map(|i| self.columns[i].as_mut_slice())
    }

    /// Borrow one column immutably and another mutably
    pub fn column_pair_mut(&mut self, from: &str, to: &str) -> Option<(&[i64], &mut [i64])> {
        let from_idx = self.position(from)?;
        let to_idx = self.position(to)?;
        if from_idx == to_idx {
            return None;
        }
        if from_idx < to_idx {
            let (head, tail) = self.columns.split_at_mut(to_idx);
            Some((head[from_idx].as_slice(), tail[0].as_mut_slice()))
        } else {
            let (head, tail) = self.columns.split_at_mut(from_idx);
            Some((tail[0].as_slice(), head[to_idx].as_mut_slice()))
        }
    }

    pub fn record(&self, index: usize) -> Option<Vec<i64>> {
        (index < self.len()).then(|| self.columns.iter().map(|c| c[index]).collect())
    }

    pub fn records(&self) -> Vec<Vec<i64>> {
        (0..self.len())
            .map(|i| self.columns.iter().map(|c| c[i]).collect())
            .collect()
    }

    /// Concatenate arrays with identical dtypes; `None` when the dtypes differ
    pub fn concat(arrays: &[IndexArray]) -> Option<IndexArray> {
        let first = arrays.first()?;
        if arrays.iter().any(|a| a.fields != first.fields) {
            return None;
        }
        let mut result = IndexArray::new(first.fields.clone());
        for array in arrays {
            for (target, source) in result.columns.iter_mut().zip(&array.columns) {
                target.extend_from_slice(source);
            }
        }
        Some(result)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = read_file(path)?;
        let (header, offset) = decode(path, &raw)?;
        let Dtype::Record(fields) = header.dtype else {
            return Err(PresamplesError::npy(path, "indices must have a structured dtype"));
        };
        if fields.is_empty() {
            return Err(PresamplesError::npy(path, "indices dtype has no fields"));
        }
        if header.shape.len() != 1 {
            return Err(PresamplesError::npy(
                path,
                format!("indices must be 1-dimensional, got shape {:?}", header.shape),
            ));
        }
        if let Some(field) = fields.iter().find(|f| f.dtype.kind == ScalarKind::Float) {
            return Err(PresamplesError::npy(
                path,
                format!("index field '{}' must be an integer type", field.name),
            ));
        }

        let count = header.shape[0];
        let itemsize = Dtype::Record(fields.clone()).itemsize();
        let mut columns = vec![Vec::with_capacity(count); fields.len()];
        for record in raw[offset..offset + count * itemsize].chunks_exact(itemsize) {
            let mut cursor = 0;
            for (field, column) in fields.iter().zip(columns.iter_mut()) {
                let value = field.dtype.read_i128(&record[cursor..cursor + field.dtype.size]);
                let value = i64::try_from(value).map_err(|_| {
                    PresamplesError::npy(
                        path,
                        format!("value {value} in field '{}' exceeds int64", field.name),
                    )
                })?;
                column.push(value);
                cursor += field.dtype.size;
            }
        }
        let fields = fields
            .into_iter()
            .map(|f| RecordField::new(f.name, f.dtype.normalized()))
            .collect();
        Ok(Self { fields, columns })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let header = NpyHeader {
            dtype: self.dtype(),
            fortran_order: false,
            shape: vec![self.len()],
        };
        let mut payload = Vec::with_capacity(self.len() * header.dtype.itemsize());
        for row in 0..self.len() {
            for (field, column) in self.fields.iter().zip(&self.columns) {
                field
                    .dtype
                    .write_i64(column[row], &mut payload)
                    .map_err(|reason| {
                        PresamplesError::npy(path, format!("field '{}': {reason}", field.name))
                    })?;
            }
        }
        write_file(path, &encode(&header, &payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn u32_fields(names: &[&str]) -> Vec<RecordField> {
        names
            .iter()
            .map(|n| RecordField::new(*n, ScalarType::U32))
            .collect()
    }

    #[test]
    fn test_scalar_type_parsing() {
        assert_eq!(ScalarType::parse("<f8"), Some(ScalarType::F64));
        assert_eq!(ScalarType::parse("|u1"), Some(ScalarType::U8));
        assert_eq!(ScalarType::parse("|b1"), Some(ScalarType::BOOL));
        assert_eq!(
            ScalarType::parse(">i4").map(|t| t.order),
            Some(ByteOrder::Big)
        );
        assert_eq!(ScalarType::parse("<f2"), None);
        assert_eq!(ScalarType::parse("<U10"), None);
        assert_eq!(ScalarType::parse("|u4"), None);
    }

    #[test]
    fn test_parse_numpy_header() {
        let header = parse_header(
            "{'descr': [('input', '<u4'), ('type', '|u1')], 'fortran_order': False, 'shape': (3,), }",
        )
        .unwrap();
        assert_eq!(header.shape, vec![3]);
        assert!(!header.fortran_order);
        assert_eq!(
            header.dtype,
            Dtype::Record(vec![
                RecordField::new("input", ScalarType::U32),
                RecordField::new("type", ScalarType::U8),
            ])
        );
        assert_eq!(header.dtype.itemsize(), 5);
    }

    #[test]
    fn test_parse_header_rejects_garbage() {
        assert!(parse_header("woops").is_err());
        assert!(parse_header("{'descr': '<f8', 'shape': (2, 2)}").is_err());
        assert!(parse_header("{'descr': '<c16', 'fortran_order': False, 'shape': ()}").is_err());
    }

    #[test]
    fn test_header_is_aligned() {
        let header = NpyHeader {
            dtype: Dtype::Scalar(ScalarType::F64),
            fortran_order: false,
            shape: vec![3, 4],
        };
        let bytes = encode(&header, &[]);
        assert_eq!(bytes.len() % HEADER_ALIGNMENT, 0);
        assert_eq!(bytes[6], 1);
        assert_eq!(*bytes.last().unwrap(), b'\n');
    }

    #[test]
    fn test_samples_written_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("samples.npy");
        let samples = SampleArray::from_rows(vec![vec![1.0, 2.0], vec![3.5, -4.0]]).unwrap();
        samples.write(&path).unwrap();

        let loaded = SampleArray::read(&path).unwrap();
        assert_eq!(loaded, samples);
        assert_eq!(loaded.get(1, 0), Some(3.5));
    }

    #[test]
    fn test_fortran_order_samples_are_transposed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fortran.npy");
        let header = NpyHeader {
            dtype: Dtype::Scalar(ScalarType::F32),
            fortran_order: true,
            shape: vec![2, 3],
        };
        // column-major storage of [[1, 2, 3], [4, 5, 6]]
        let mut payload = Vec::new();
        for value in [1.0f32, 4.0, 2.0, 5.0, 3.0, 6.0] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        fs::write(&path, encode(&header, &payload)).unwrap();

        let loaded = SampleArray::read(&path).unwrap();
        assert_eq!(loaded.row(0).unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(loaded.row(1).unwrap(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_big_endian_indices() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("be.npy");
        let header = NpyHeader {
            dtype: Dtype::Record(vec![RecordField::new(
                "flow",
                ScalarType::parse(">u4").unwrap(),
            )]),
            fortran_order: false,
            shape: vec![2],
        };
        let mut payload = Vec::new();
        payload.extend_from_slice(&7u32.to_be_bytes());
        payload.extend_from_slice(&300u32.to_be_bytes());
        fs::write(&path, encode(&header, &payload)).unwrap();

        let loaded = IndexArray::read(&path).unwrap();
        assert_eq!(loaded.column("flow").unwrap(), &[7, 300]);
        assert_eq!(loaded.fields()[0].dtype, ScalarType::U32);
    }

    #[test]
    fn test_indices_written_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("indices.npy");
        let mut fields = u32_fields(&["input", "output"]);
        fields.push(RecordField::new("type", ScalarType::U8));
        let indices =
            IndexArray::from_records(fields, &[vec![1, 2, 0], vec![3, 4, 1]]).unwrap();
        indices.write(&path).unwrap();

        let loaded = IndexArray::read(&path).unwrap();
        assert_eq!(loaded.records(), vec![vec![1, 2, 0], vec![3, 4, 1]]);
        assert_eq!(loaded.dtype(), indices.dtype());
    }

    #[test]
    fn test_write_rejects_out_of_range_values() {
        let dir = TempDir::new().unwrap();
        let indices = IndexArray::from_records(
            vec![RecordField::new("type", ScalarType::U8)],
            &[vec![256]],
        )
        .unwrap();
        let err = indices.write(&dir.path().join("bad.npy")).unwrap_err();
        assert!(matches!(err, PresamplesError::Npy { .. }));
    }

    #[test]
    fn test_truncated_and_corrupt_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.npy");
        fs::write(&path, "woops").unwrap();
        assert!(matches!(
            SampleArray::read(&path),
            Err(PresamplesError::Npy { .. })
        ));

        let header = NpyHeader {
            dtype: Dtype::Scalar(ScalarType::F64),
            fortran_order: false,
            shape: vec![4],
        };
        fs::write(&path, encode(&header, &[0u8; 16])).unwrap();
        let err = SampleArray::read(&path).unwrap_err();
        assert!(err.to_string().contains("truncated data"));
    }

    #[test]
    fn test_structured_and_scalar_readers_are_not_interchangeable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("samples.npy");
        SampleArray::filled(2, 2, 1.0).write(&path).unwrap();
        assert!(IndexArray::read(&path).is_err());
    }

    #[test]
    fn test_concat_requires_matching_fields() {
        let a = IndexArray::from_records(u32_fields(&["a", "b"]), &[vec![1, 2]]).unwrap();
        let b = IndexArray::from_records(u32_fields(&["a", "b"]), &[vec![3, 4]]).unwrap();
        let c = IndexArray::from_records(u32_fields(&["a", "c"]), &[vec![5, 6]]).unwrap();

        let joined = IndexArray::concat(&[a.clone(), b]).unwrap();
        assert_eq!(joined.records(), vec![vec![1, 2], vec![3, 4]]);
        assert!(IndexArray::concat(&[a, c]).is_none());
    }

    #[test]
    fn test_column_pair_mut() {
        let mut array =
            IndexArray::from_records(u32_fields(&["to", "from"]), &[vec![0, 5]]).unwrap();
        let (from, to) = array.column_pair_mut("from", "to").unwrap();
        to[0] = from[0] * 2;
        assert_eq!(array.column("to").unwrap(), &[10]);
        assert!(array.column_pair_mut("to", "to").is_none());
    }

    fn raw_npy(major: u8, literal: &str, payload: &[u8]) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend([major, 0]);
        let header = format!("{literal}\n");
        if major == 1 {
            bytes.extend((header.len() as u16).to_le_bytes());
        } else {
            bytes.extend((header.len() as u32).to_le_bytes());
        }
        bytes.extend(header.as_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_reads_version_2_and_3_headers() {
        let dir = TempDir::new().unwrap();
        let payload: Vec<u8> = [1.5f64, -2.0, 3.25]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let literal = "{'descr': '<f8', 'fortran_order': False, 'shape': (3, 1), }";

        for major in [2u8, 3] {
            let path = dir.path().join(format!("v{major}.npy"));
            fs::write(&path, raw_npy(major, literal, &payload)).unwrap();
            let samples = SampleArray::read(&path).unwrap();
            assert_eq!(samples.shape(), (3, 1));
            assert_eq!(samples.row(0), Some(&[1.5][..]));
            assert_eq!(samples.get(2, 0), Some(3.25));
        }

        let path = dir.path().join("v4.npy");
        fs::write(&path, raw_npy(4, literal, &payload)).unwrap();
        assert!(matches!(SampleArray::read(&path), Err(PresamplesError::Npy { .. })));
    }

    #[test]
    fn test_reads_version_3_structured_indices() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("indices.npy");
        let mut payload = Vec::new();
        for (flow, row) in [(7u32, 0u32), (9, 1)] {
            payload.extend(flow.to_le_bytes());
            payload.extend(row.to_le_bytes());
        }
        let literal = "{'descr': [('flow', '<u4'), ('row', '<u4')], 'fortran_order': False, 'shape': (2,), }";
        fs::write(&path, raw_npy(3, literal, &payload)).unwrap();

        let indices = IndexArray::read(&path).unwrap();
        assert_eq!(indices.records(), vec![vec![7, 0], vec![9, 1]]);
    }

    #[test]
    fn test_large_header_written_as_version_2() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wide.npy");
        let names: Vec<String> = (0..4000).map(|i| format!("field_{i:04}")).collect();
        let fields: Vec<RecordField> = names
            .iter()
            .map(|n| RecordField::new(n.as_str(), ScalarType::U32))
            .collect();
        let record: Vec<i64> = (0..4000).collect();
        let array = IndexArray::from_records(fields, &[record]).unwrap();
        array.write(&path).unwrap();

        let raw = fs::read(&path).unwrap();
        assert_eq!(raw[6], 2);
        let header_len = u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]) as usize;
        assert!(header_len > u16::MAX as usize);
        assert_eq!((12 + header_len) % HEADER_ALIGNMENT, 0);

        let loaded = IndexArray::read(&path).unwrap();
        assert_eq!(loaded, array);
        assert_eq!(loaded.column("field_3999").unwrap(), &[3999]);
    }
}

use std::{
    borrow::Cow,
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use nutrition::ScanRecord;

pub const CSV_HEADER: [&str; 8] = [
    "timestamp",
    "barcode",
    "product_name",
    "calories",
    "protein",
    "sugar",
    "carbs",
    "fat",
];

/// Append-only CSV log, one row per accepted scan.
pub struct ScanLog {
    path: PathBuf,
    out: Box<dyn Write + Send>,
}

impl ScanLog {
    /// Open `path` for appending, writing the header when the file is new or empty.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if file.metadata()?.len() == 0 {
            write_row(&mut file, &CSV_HEADER)?;
        }
        Ok(Self {
            path,
            out: Box::new(file),
        })
    }

    /// Log rows to `out` instead of a file; no header is written.
    #[cfg(test)]
    pub(crate) fn with_writer(path: impl Into<PathBuf>, out: impl Write + Send + 'static) -> Self {
        Self {
            path: path.into(),
            out: Box::new(out),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, scan: &ScanRecord, at: NaiveDateTime) -> io::Result<()> {
        let fields = [
            at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            scan.barcode.to_string(),
            scan.product_name.clone(),
            scan.calories.to_string(),
            scan.protein.to_string(),
            scan.sugar.to_string(),
            scan.carbs.to_string(),
            scan.fat.to_string(),
        ];
        write_row(&mut self.out, &fields)
    }
}

fn write_row<S: AsRef<str>>(out: &mut impl Write, fields: &[S]) -> io::Result<()> {
    let line = fields
        .iter()
        .map(|field| quote(field.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    out.write_all(line.as_bytes())?;
    out.write_all(b"\r\n")?;
    out.flush()
}

/// RFC 4180 quoting: only fields holding a delimiter, quote, or line break.
fn quote(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

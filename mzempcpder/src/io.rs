use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mzempcpd::Peak;

use crate::driver::MZEmpCpderError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Feature tables name the peak identifier either as a string or a number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Text(String),
    Number(u64),
}

impl From<RecordId> for String {
    fn from(value: RecordId) -> Self {
        match value {
            RecordId::Text(s) => s,
            RecordId::Number(n) => n.to_string(),
        }
    }
}

/// A peak as it appears in an input feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakRecord {
    #[serde(alias = "id_number")]
    pub id: RecordId,
    pub mz: f64,
    #[serde(default)]
    pub calibrated_mz: Option<f64>,
    #[serde(alias = "rtime")]
    pub apex: f64,
    #[serde(alias = "intensity", alias = "peak_height")]
    pub height: f64,
    #[serde(default, alias = "rtime_left_base")]
    pub left_base: Option<f64>,
    #[serde(default, alias = "rtime_right_base")]
    pub right_base: Option<f64>,
}

impl From<PeakRecord> for Peak {
    fn from(value: PeakRecord) -> Self {
        Peak {
            id: value.id.into(),
            mz: value.mz,
            calibrated_mz: value.calibrated_mz,
            apex: value.apex,
            height: value.height,
            left_base: value.left_base,
            right_base: value.right_base,
            ion_relation: None,
        }
    }
}

pub fn is_gzip_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

fn parse_records<R: Read>(reader: R) -> Result<Vec<Peak>, MZEmpCpderError> {
    let records: Vec<PeakRecord> = serde_json::from_reader(io::BufReader::new(reader))?;
    Ok(records.into_iter().map(Peak::from).collect())
}

/// Read a JSON array of peak records from `source`, or from STDIN if `source` is `-`.
///
/// Files ending in `.gz` are decompressed, as is a gzip stream on STDIN.
pub fn read_peaks(source: &str) -> Result<Vec<Peak>, MZEmpCpderError> {
    if source == "-" {
        let mut buffer = Vec::new();
        io::stdin().lock().read_to_end(&mut buffer)?;
        let compressed = buffer.starts_with(&GZIP_MAGIC);
        debug!("Reading peaks from STDIN (compressed? {compressed})");
        if compressed {
            parse_records(GzDecoder::new(buffer.as_slice()))
        } else {
            parse_records(buffer.as_slice())
        }
    } else {
        let handle = fs::File::open(source)?;
        let compressed = is_gzip_path(source);
        debug!("Reading peaks from {source} (compressed? {compressed})");
        if compressed {
            parse_records(GzDecoder::new(handle))
        } else {
            parse_records(handle)
        }
    }
}

/// Open `path` for writing, or STDOUT if `path` is `-`, and pass the stream to `func`.
///
/// Paths ending in `.gz` are gzip compressed.
pub fn write_output<P, F>(path: P, func: F) -> Result<(), MZEmpCpderError>
where
    P: AsRef<Path>,
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let path = path.as_ref();
    let mut handle: Box<dyn Write> = if path == Path::new("-") {
        Box::new(io::stdout().lock())
    } else {
        Box::new(io::BufWriter::new(fs::File::create(path)?))
    };
    if is_gzip_path(path) {
        let mut encoder = GzEncoder::new(handle, Compression::best());
        func(&mut encoder)?;
        encoder.finish()?.flush()?;
    } else {
        func(&mut handle)?;
        handle.flush()?;
    }
    Ok(())
}

/// Write `value` as pretty-printed JSON to `path`
pub fn write_json<P: AsRef<Path>, T: Serialize + ?Sized>(
    path: P,
    value: &T,
) -> Result<(), MZEmpCpderError> {
    write_output(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, value)?;
        writeln!(writer)
    })
}

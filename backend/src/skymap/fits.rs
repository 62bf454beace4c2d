//! FITS binary-table access through cfitsio.
//!
//! Sky maps are distributed as a FITS file whose first BINTABLE extension
//! holds one row per pixel. cfitsio opens files by path, so in-memory
//! payloads are spooled to a temporary file that lives as long as the table.

use std::io::Write;
use std::path::Path;

use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::FitsFile;
use tempfile::NamedTempFile;

use super::{SkyMapError, SkyMapResult};

fn format_error(e: fitsio::errors::Error) -> SkyMapError {
    SkyMapError::Format(e.to_string())
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    repeat: usize,
}

/// First BINTABLE extension of an open FITS file.
///
/// Column and keyword lookups are case-insensitive. Reads go through
/// cfitsio, which applies `TSCALn`/`TZEROn` and converts between numeric
/// column types.
pub struct BinTable {
    file: FitsFile,
    primary: FitsHdu,
    table: FitsHdu,
    columns: Vec<Column>,
    nrows: usize,
    // Dropped after `file`.
    _spool: Option<NamedTempFile>,
}

impl BinTable {
    pub fn open(path: &Path) -> SkyMapResult<Self> {
        let file = FitsFile::open(path).map_err(format_error)?;
        Self::from_file(file, None)
    }

    /// Spool `bytes` to a temporary `.fits` file and open it.
    pub fn from_bytes(bytes: &[u8]) -> SkyMapResult<Self> {
        let mut spool = tempfile::Builder::new().suffix(".fits").tempfile()?;
        spool.write_all(bytes)?;
        spool.flush()?;
        let file = FitsFile::open(spool.path()).map_err(format_error)?;
        Self::from_file(file, Some(spool))
    }

    fn from_file(mut file: FitsFile, spool: Option<NamedTempFile>) -> SkyMapResult<Self> {
        let primary = file.primary_hdu().map_err(format_error)?;

        let mut index = 1usize;
        let table = loop {
            let hdu = file
                .hdu(index)
                .map_err(|_| SkyMapError::Format("no BINTABLE extension".to_string()))?;
            let xtension = hdu.read_key::<String>(&mut file, "XTENSION").unwrap_or_default();
            if xtension.trim() == "BINTABLE" && matches!(hdu.info, HduInfo::TableInfo { .. }) {
                break hdu;
            }
            index += 1;
        };

        let (columns, nrows) = match &table.info {
            HduInfo::TableInfo {
                column_descriptions,
                num_rows,
            } => (
                column_descriptions
                    .iter()
                    .map(|c| Column {
                        name: c.name.trim().to_string(),
                        repeat: c.data_type.repeat,
                    })
                    .collect(),
                *num_rows,
            ),
            _ => (Vec::new(), 0),
        };
        log::debug!("BINTABLE in HDU {}: {} rows, {} columns", index, nrows, columns.len());

        Ok(Self {
            file,
            primary,
            table,
            columns,
            nrows,
            _spool: spool,
        })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Name as stored in the file, for a scalar column.
    fn scalar_column(&self, name: &str) -> SkyMapResult<String> {
        let column = self
            .column(name)
            .ok_or_else(|| SkyMapError::MissingColumn(name.to_string()))?;
        if column.repeat != 1 {
            return Err(SkyMapError::Format(format!(
                "column {} holds {} values per row; only scalar columns are supported",
                column.name, column.repeat
            )));
        }
        Ok(column.name.clone())
    }

    pub fn column_f64(&mut self, name: &str) -> SkyMapResult<Vec<f64>> {
        let name = self.scalar_column(name)?;
        self.table.read_col::<f64>(&mut self.file, &name).map_err(format_error)
    }

    pub fn column_i64(&mut self, name: &str) -> SkyMapResult<Vec<i64>> {
        let name = self.scalar_column(name)?;
        self.table.read_col::<i64>(&mut self.file, &name).map_err(format_error)
    }

    /// String keyword of the table header; `None` when absent or not a string.
    pub fn key_str(&mut self, key: &str) -> Option<String> {
        self.table
            .read_key::<String>(&mut self.file, key)
            .ok()
            .map(|s| s.trim().to_string())
    }

    pub fn key_f64(&mut self, key: &str) -> Option<f64> {
        self.table.read_key::<f64>(&mut self.file, key).ok()
    }

    pub fn key_i64(&mut self, key: &str) -> Option<i64> {
        self.table.read_key::<i64>(&mut self.file, key).ok()
    }

    /// String keyword of the primary header.
    pub fn primary_key_str(&mut self, key: &str) -> Option<String> {
        self.primary
            .read_key::<String>(&mut self.file, key)
            .ok()
            .map(|s| s.trim().to_string())
    }
}

#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Write;
use std::sync::Mutex;

use flate2::write::GzEncoder;
use flate2::Compression;

use gw_followup::models::CandidateRecord;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// Restores the variables on unwind and serializes access to the process
/// environment, since tests run in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

// ==================== Synthetic FITS maps ====================

const BLOCK: usize = 2880;

/// One 80-character header card.
pub fn card(keyword: &str, value: &str) -> String {
    format!("{:<8}= {:<70}", keyword, value)
}

pub fn quoted(value: &str) -> String {
    format!("'{:<8}'", value)
}

fn header_block(cards: &[String]) -> Vec<u8> {
    let mut out: Vec<u8> = cards.concat().into_bytes();
    out.extend(format!("{:<80}", "END").into_bytes());
    let padded = out.len().div_ceil(BLOCK) * BLOCK;
    out.resize(padded, b' ');
    out
}

/// Table column: name, TFORM code and big-endian row values.
pub enum Column<'a> {
    F64(&'a str, &'a [f64]),
    F32(&'a str, &'a [f32]),
    I64(&'a str, &'a [i64]),
}

impl Column<'_> {
    fn name(&self) -> &str {
        match self {
            Column::F64(n, _) | Column::F32(n, _) | Column::I64(n, _) => n,
        }
    }

    fn tform(&self) -> &'static str {
        match self {
            Column::F64(..) => "D",
            Column::F32(..) => "E",
            Column::I64(..) => "K",
        }
    }

    fn width(&self) -> usize {
        match self {
            Column::F32(..) => 4,
            Column::F64(..) | Column::I64(..) => 8,
        }
    }

    fn len(&self) -> usize {
        match self {
            Column::F64(_, v) => v.len(),
            Column::F32(_, v) => v.len(),
            Column::I64(_, v) => v.len(),
        }
    }

    fn write_row(&self, row: usize, out: &mut Vec<u8>) {
        match self {
            Column::F64(_, v) => out.extend(v[row].to_be_bytes()),
            Column::F32(_, v) => out.extend(v[row].to_be_bytes()),
            Column::I64(_, v) => out.extend(v[row].to_be_bytes()),
        }
    }
}

/// FITS file with an empty primary HDU and one BINTABLE holding `columns`.
///
/// `extra` cards (already formatted with [`card`]) go into the table header.
pub fn fits_table(columns: &[Column], extra: &[String]) -> Vec<u8> {
    let nrows = columns.first().map(|c| c.len()).unwrap_or(0);
    let row_bytes: usize = columns.iter().map(Column::width).sum();

    let mut bytes = header_block(&[
        card("SIMPLE", "T"),
        card("BITPIX", "8"),
        card("NAXIS", "0"),
        card("EXTEND", "T"),
    ]);

    let mut cards = vec![
        card("XTENSION", &quoted("BINTABLE")),
        card("BITPIX", "8"),
        card("NAXIS", "2"),
        card("NAXIS1", &row_bytes.to_string()),
        card("NAXIS2", &nrows.to_string()),
        card("PCOUNT", "0"),
        card("GCOUNT", "1"),
        card("TFIELDS", &columns.len().to_string()),
    ];
    for (i, column) in columns.iter().enumerate() {
        cards.push(card(&format!("TTYPE{}", i + 1), &quoted(column.name())));
        cards.push(card(&format!("TFORM{}", i + 1), &quoted(column.tform())));
    }
    cards.extend(extra.iter().cloned());
    bytes.extend(header_block(&cards));

    let mut data = Vec::with_capacity(nrows * row_bytes);
    for row in 0..nrows {
        for column in columns {
            column.write_row(row, &mut data);
        }
    }
    let padded = data.len().div_ceil(BLOCK) * BLOCK;
    data.resize(padded, 0);
    bytes.extend(data);
    bytes
}

/// Flat HEALPix map with optional distance layer.
pub fn flat_map(
    prob: &[f64],
    ordering: &str,
    distance: Option<(&[f64], &[f64], &[f64])>,
    extra: &[String],
) -> Vec<u8> {
    let mut columns = vec![Column::F64("PROB", prob)];
    if let Some((mu, sigma, norm)) = distance {
        columns.push(Column::F64("DISTMU", mu));
        columns.push(Column::F64("DISTSIGMA", sigma));
        columns.push(Column::F64("DISTNORM", norm));
    }
    let mut cards = vec![
        card("PIXTYPE", &quoted("HEALPIX")),
        card("ORDERING", &quoted(ordering)),
        card("INDXSCHM", &quoted("IMPLICIT")),
    ];
    cards.extend(extra.iter().cloned());
    fits_table(&columns, &cards)
}

/// Multi-order map from `(uniq, probdensity)` rows.
pub fn multiorder_map(uniq: &[i64], density: &[f64], extra: &[String]) -> Vec<u8> {
    let mut cards = vec![
        card("PIXTYPE", &quoted("HEALPIX")),
        card("ORDERING", &quoted("NUNIQ")),
        card("INDXSCHM", &quoted("EXPLICIT")),
    ];
    cards.extend(extra.iter().cloned());
    fits_table(&[Column::I64("UNIQ", uniq), Column::F64("PROBDENSITY", density)], &cards)
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

// ==================== Candidates ====================

pub fn record(oid: &str, ra: f64, dec: f64, firstmjd: f64) -> CandidateRecord {
    CandidateRecord {
        oid: oid.into(),
        meanra: ra,
        meandec: dec,
        ndet: 3,
        firstmjd,
        lastmjd: firstmjd + 3.0,
        mjdstarthist: Some(firstmjd),
        mjdendhist: Some(firstmjd + 3.0),
        stellar: Some(false),
        sgscore: Some(0.1),
        class: None,
        probability: None,
    }
}

//! Delimited-table I/O for named matrices. Tables are tab- or
//! comma-separated with a header row of column names and a leading
//! column of row names; `.gz` paths are compressed transparently.

use flate2::read::GzDecoder;
use nalgebra::{DMatrix, Scalar};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::dataset::Mat;

/// A dense matrix with row and column names attached.
pub struct NamedMat {
    pub rows: Vec<Box<str>>,
    pub cols: Vec<Box<str>>,
    pub mat: Mat,
}

const DELIMS: &[char] = &['\t', ','];

/// Open a file for reading, and return a buffered reader
/// * `input_file` - file name--either gzipped or not
pub fn open_buf_reader(input_file: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let ext = Path::new(input_file).extension().and_then(|x| x.to_str());
    match ext {
        Some("gz") => {
            let input_file = File::open(input_file)?;
            let decoder = GzDecoder::new(input_file);
            Ok(Box::new(BufReader::new(decoder)))
        }
        _ => {
            let input_file = File::open(input_file)?;
            Ok(Box::new(BufReader::new(input_file)))
        }
    }
}

/// Open a file for writing, and return a buffered writer
/// * `output_file` - file name--either gzipped or not
pub fn open_buf_writer(output_file: &str) -> anyhow::Result<Box<dyn Write>> {
    let ext = Path::new(output_file).extension().and_then(|x| x.to_str());
    match ext {
        Some("gz") => {
            let output_file = File::create(output_file)?;
            let encoder =
                flate2::write::GzEncoder::new(output_file, flate2::Compression::default());
            Ok(Box::new(BufWriter::new(encoder)))
        }
        _ => {
            let output_file = File::create(output_file)?;
            Ok(Box::new(BufWriter::new(output_file)))
        }
    }
}

/// Read a named matrix from a delimited table. The first non-comment
/// line is the header; the header may or may not carry a label for the
/// row-name column. Missing values (`NA`, `NaN`, empty) parse to NaN.
pub fn read_named_matrix(input_file: &str) -> anyhow::Result<NamedMat> {
    let buf = open_buf_reader(input_file)?;

    let mut header: Option<Vec<Box<str>>> = None;
    let mut rows: Vec<Box<str>> = vec![];
    let mut data: Vec<f64> = vec![];
    let mut ncols = 0_usize;

    for line in buf.lines() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
            continue;
        }
        let words: Vec<&str> = line.split(DELIMS).collect();

        match header {
            None => {
                header = Some(words.iter().map(|x| Box::from(*x)).collect());
            }
            Some(_) => {
                let (name, values) = words
                    .split_first()
                    .ok_or_else(|| anyhow::anyhow!("empty data line in {}", input_file))?;

                if ncols == 0 {
                    ncols = values.len();
                } else if values.len() != ncols {
                    return Err(anyhow::anyhow!(
                        "ragged table {}: row '{}' has {} values, expected {}",
                        input_file,
                        name,
                        values.len(),
                        ncols
                    ));
                }

                rows.push(Box::from(*name));
                for v in values {
                    data.push(parse_value(v));
                }
            }
        }
    }

    let mut cols = header.ok_or_else(|| anyhow::anyhow!("no header line in {}", input_file))?;
    // drop the row-name column label when the header carries one
    if cols.len() == ncols + 1 {
        cols.remove(0);
    }
    if cols.len() != ncols {
        return Err(anyhow::anyhow!(
            "header of {} has {} names but rows carry {} values",
            input_file,
            cols.len(),
            ncols
        ));
    }

    let nrows = rows.len();
    Ok(NamedMat {
        rows,
        cols,
        mat: Mat::from_row_iterator(nrows, ncols, data),
    })
}

fn parse_value(word: &str) -> f64 {
    match word {
        "" | "NA" | "na" | "NaN" | "nan" => f64::NAN,
        w => w.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Write a named matrix as a tab-separated table. `corner` labels the
/// row-name column in the header.
pub fn write_named_matrix<T>(
    output_file: &str,
    mat: &DMatrix<T>,
    rows: &[Box<str>],
    cols: &[Box<str>],
    corner: &str,
) -> anyhow::Result<()>
where
    T: Scalar + Display,
{
    let mut buf = open_buf_writer(output_file)?;

    write!(buf, "{}", corner)?;
    for c in cols {
        write!(buf, "\t{}", c)?;
    }
    writeln!(buf)?;

    for (i, r) in rows.iter().enumerate() {
        write!(buf, "{}", r)?;
        for j in 0..mat.ncols() {
            write!(buf, "\t{}", mat[(i, j)])?;
        }
        writeln!(buf)?;
    }

    buf.flush()?;
    Ok(())
}

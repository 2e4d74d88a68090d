//! Calibration result persistence in OpenCV `FileStorage` XML shape.
//!
//! The files produced here are readable by `cv::FileStorage`: a flat
//! `<opencv_storage>` document with scalar nodes (`RMS`, `Xi`) and
//! `opencv-matrix` nodes (`K`, `D`). Only this subset is supported; the
//! reader exists to verify round-trips and to let downstream tools consume
//! the results without OpenCV.

use std::fs;
use std::path::Path;

use nalgebra::DMatrix;
use thiserror::Error;

use crate::math::{Mat3, Real};
use crate::report::CalibrationReport;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error accessing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing <{0}> node")]
    MissingNode(String),

    #[error("malformed <{node}> node: {reason}")]
    Malformed { node: String, reason: String },
}

/// Write one model's calibration to `path`, overwriting any existing file.
pub fn write_calibration(path: &Path, report: &CalibrationReport) -> Result<(), StorageError> {
    let mut doc = String::new();
    doc.push_str("<?xml version=\"1.0\"?>\n<opencv_storage>\n");
    push_scalar(&mut doc, "RMS", report.rms);
    push_matrix(&mut doc, "K", 3, 3, report.k.transpose().as_slice());
    if let Some(xi) = report.xi {
        push_scalar(&mut doc, "Xi", xi);
    }
    push_matrix(&mut doc, "D", 1, report.d.len(), &report.d);
    doc.push_str("</opencv_storage>\n");

    fs::write(path, doc).map_err(|source| StorageError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Read back a calibration file written by [`write_calibration`].
pub fn read_calibration(path: &Path) -> Result<CalibrationReport, StorageError> {
    let doc = fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let rms = parse_scalar(&doc, "RMS")?;
    let xi = match node_text(&doc, "Xi") {
        Some(_) => Some(parse_scalar(&doc, "Xi")?),
        None => None,
    };

    let k = parse_matrix(&doc, "K")?;
    if k.nrows() != 3 || k.ncols() != 3 {
        return Err(StorageError::Malformed {
            node: "K".into(),
            reason: format!("expected 3x3, got {}x{}", k.nrows(), k.ncols()),
        });
    }
    let k = Mat3::from_iterator(k.iter().copied());

    let d = parse_matrix(&doc, "D")?;
    let d: Vec<Real> = d.iter().copied().collect();

    Ok(CalibrationReport { rms, k, d, xi })
}

fn push_scalar(doc: &mut String, name: &str, value: Real) {
    doc.push_str(&format!("<{name}>{value}</{name}>\n"));
}

/// `data` is row-major; nalgebra stores column-major, hence the transpose
/// at the call sites.
fn push_matrix(doc: &mut String, name: &str, rows: usize, cols: usize, data: &[Real]) {
    doc.push_str(&format!(
        "<{name} type_id=\"opencv-matrix\">\n  <rows>{rows}</rows>\n  <cols>{cols}</cols>\n  <dt>d</dt>\n  <data>\n   "
    ));
    for v in data {
        doc.push_str(&format!(" {v}"));
    }
    doc.push_str(&format!("</data></{name}>\n"));
}

/// Text between `<name ...>` and `</name>`, or `None` if the node is absent.
fn node_text<'a>(doc: &'a str, name: &str) -> Option<&'a str> {
    let start_tag = format!("<{name}");
    let start = doc.find(&start_tag)?;
    let body_start = doc[start..].find('>')? + start + 1;
    let end_tag = format!("</{name}>");
    let body_end = doc[body_start..].find(&end_tag)? + body_start;
    Some(&doc[body_start..body_end])
}

fn parse_scalar(doc: &str, name: &str) -> Result<Real, StorageError> {
    let text = node_text(doc, name).ok_or_else(|| StorageError::MissingNode(name.into()))?;
    text.trim()
        .parse::<Real>()
        .map_err(|e| StorageError::Malformed {
            node: name.into(),
            reason: e.to_string(),
        })
}

fn parse_matrix(doc: &str, name: &str) -> Result<DMatrix<Real>, StorageError> {
    let body = node_text(doc, name).ok_or_else(|| StorageError::MissingNode(name.into()))?;

    let rows = parse_scalar(body, "rows")? as usize;
    let cols = parse_scalar(body, "cols")? as usize;
    let data = node_text(body, "data").ok_or_else(|| StorageError::MissingNode("data".into()))?;

    let values: Result<Vec<Real>, _> = data
        .split_whitespace()
        .map(|tok| tok.parse::<Real>())
        .collect();
    let values = values.map_err(|e| StorageError::Malformed {
        node: name.into(),
        reason: e.to_string(),
    })?;

    if values.len() != rows * cols {
        return Err(StorageError::Malformed {
            node: name.into(),
            reason: format!("expected {} values, got {}", rows * cols, values.len()),
        });
    }

    // Row-major on disk.
    Ok(DMatrix::from_row_slice(rows, cols, &values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report(xi: Option<Real>, d: Vec<Real>) -> CalibrationReport {
        CalibrationReport {
            rms: 0.37218,
            k: Mat3::new(
                812.3, 0.0, 321.75, 0.0, 809.96, 238.1, 0.0, 0.0, 1.0,
            ),
            d,
            xi,
        }
    }

    #[test]
    fn round_trip_without_xi() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perspectiveCalibrate.xml");

        let report = sample_report(None, vec![0.1, -0.2, 0.001, -0.002, 0.05]);
        write_calibration(&path, &report).unwrap();
        let back = read_calibration(&path).unwrap();

        assert_eq!(back.rms, report.rms);
        assert_eq!(back.k, report.k);
        assert_eq!(back.d, report.d);
        assert_eq!(back.xi, None);
    }

    #[test]
    fn round_trip_with_xi() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("omnidirectionalCalibrate.xml");

        let report = sample_report(Some(1.234), vec![0.1, -0.2, 0.001, -0.002]);
        write_calibration(&path, &report).unwrap();
        let back = read_calibration(&path).unwrap();

        assert_eq!(back.xi, Some(1.234));
        assert_eq!(back.d.len(), 4);
        assert_eq!(back.k, report.k);
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fisheyeCalibrate.xml");

        write_calibration(&path, &sample_report(None, vec![1.0; 4])).unwrap();
        let second = sample_report(None, vec![2.0; 4]);
        write_calibration(&path, &second).unwrap();

        let back = read_calibration(&path).unwrap();
        assert_eq!(back.d, vec![2.0; 4]);
    }

    #[test]
    fn k_survives_row_major_layout() {
        // Asymmetric K catches row/column-major confusion.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k.xml");

        let mut report = sample_report(None, vec![0.0; 5]);
        report.k = Mat3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        write_calibration(&path, &report).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let data_start = text.find("<data>").unwrap();
        let data_end = text.find("</data>").unwrap();
        let first: Vec<&str> = text[data_start + 6..data_end].split_whitespace().collect();
        assert_eq!(first[..3], ["1", "2", "3"]);

        let back = read_calibration(&path).unwrap();
        assert_eq!(back.k, report.k);
    }

    #[test]
    fn missing_node_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xml");
        fs::write(&path, "<?xml version=\"1.0\"?>\n<opencv_storage>\n</opencv_storage>\n")
            .unwrap();

        assert!(matches!(
            read_calibration(&path),
            Err(StorageError::MissingNode(node)) if node == "RMS"
        ));
    }
}

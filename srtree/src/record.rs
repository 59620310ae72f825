//! Text record files.
//!
//! The first line holds the dimension. Every following line is one record,
//! `c1:c2:...:cD:payload`; lines starting with `#` are comments. Payloads
//! read from a file carry a trailing NUL byte, so a payload of `n`
//! characters takes `n + 1` bytes in the index.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use crate::geometry::Point;
use crate::types::{DataItem, Record, SRTreeError, SRTreeResult};

/// Reads records from a record file.
pub struct RecordReader<R> {
    lines: Lines<R>,
    line_no: usize,
    dimension: usize,
}

impl RecordReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> SRTreeResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: BufRead> RecordReader<R> {
    /// Reads the header line.
    pub fn new(reader: R) -> SRTreeResult<Self> {
        let mut lines = reader.lines();
        let mut line_no = 0;
        let dimension = loop {
            line_no += 1;
            let line = match lines.next() {
                Some(line) => line?,
                None => return Err(SRTreeError::config("record file has no dimension line")),
            };
            let text = line.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            match text.parse::<usize>() {
                Ok(dimension) if dimension > 0 => break dimension,
                _ => {
                    return Err(SRTreeError::config(format!(
                        "line {}: invalid dimension `{}`",
                        line_no, text
                    )))
                }
            }
        };
        Ok(Self {
            lines,
            line_no,
            dimension,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Reads the remaining records.
    pub fn read_all(self) -> SRTreeResult<Vec<Record>> {
        self.collect()
    }

    fn parse(&self, line: &str) -> SRTreeResult<Record> {
        let mut rest = line;
        let mut coords = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            let (field, tail) = rest.split_once(':').ok_or_else(|| {
                SRTreeError::config(format!("line {}: `:` is missing in `{}`", self.line_no, line))
            })?;
            let coord = field.trim().parse::<f64>().map_err(|_| {
                SRTreeError::config(format!(
                    "line {}: invalid number `{}`",
                    self.line_no,
                    field.trim()
                ))
            })?;
            coords.push(coord);
            rest = tail.trim_start();
        }
        let mut payload = rest.as_bytes().to_vec();
        payload.push(0);
        Ok(Record::new(Point::new(coords), DataItem::new(payload)))
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = SRTreeResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            let text = line.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            return Some(self.parse(text));
        }
    }
}

/// Writes records in the format [`RecordReader`] reads.
pub struct RecordWriter<W: Write> {
    out: W,
    dimension: usize,
}

impl RecordWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>, dimension: usize) -> SRTreeResult<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file), dimension)
    }
}

impl<W: Write> RecordWriter<W> {
    /// Writes the header line.
    pub fn new(mut out: W, dimension: usize) -> SRTreeResult<Self> {
        writeln!(out, "{}", dimension)?;
        Ok(Self { out, dimension })
    }

    /// Writes one record. The payload is written up to its first NUL byte.
    pub fn write(&mut self, record: &Record) -> SRTreeResult<()> {
        if record.point.dimension() != self.dimension {
            return Err(SRTreeError::config(format!(
                "point has {} dimensions (record file has {})",
                record.point.dimension(),
                self.dimension
            )));
        }
        for c in record.point.coords() {
            write!(self.out, "{}:", c)?;
        }
        let bytes = record.data_item.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.out.write_all(&bytes[..end])?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> SRTreeResult<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_read_records() {
        let text = "2\n# cities\n35.68:139.69:tokyo\n 34.69 : 135.5 : osaka bay \n\n";
        let reader = RecordReader::new(Cursor::new(text)).unwrap();
        assert_eq!(reader.dimension(), 2);

        let records = reader.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].point, Point::new(vec![35.68, 139.69]));
        assert_eq!(records[0].data_item.as_bytes(), b"tokyo\0");
        assert_eq!(records[1].point, Point::new(vec![34.69, 135.5]));
        assert_eq!(records[1].data_item.as_bytes(), b"osaka bay\0");
    }

    #[test]
    fn test_malformed_lines_name_the_line() {
        let text = "2\n1:2:a\n1:b\n";
        let results: Vec<_> = RecordReader::new(Cursor::new(text)).unwrap().collect();
        assert!(results[0].is_ok());
        match &results[1] {
            Err(SRTreeError::Config(msg)) => assert!(msg.starts_with("line 3:")),
            other => panic!("unexpected result {:?}", other),
        }

        let text = "2\nx:1:a\n";
        let result = RecordReader::new(Cursor::new(text)).unwrap().read_all();
        assert!(matches!(result, Err(SRTreeError::Config(_))));

        assert!(RecordReader::new(Cursor::new("two\n")).is_err());
        assert!(RecordReader::new(Cursor::new("")).is_err());
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.txt");
        let records = vec![
            Record::new(Point::new(vec![0.5, -2.0, 1e-7]), DataItem::from("first")),
            Record::new(Point::new(vec![3.0, 4.0, 5.0]), DataItem::new(b"second\0".to_vec())),
        ];
        {
            let mut writer = RecordWriter::create(&path, 3).unwrap();
            for record in &records {
                writer.write(record).unwrap();
            }
            writer.flush().unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "3\n0.5:-2:0.0000001:first\n3:4:5:second\n");

        let read = RecordReader::open(&path).unwrap().read_all().unwrap();
        assert_eq!(read[0].point, records[0].point);
        assert_eq!(read[1].data_item.as_bytes(), b"second\0");
    }

    #[test]
    fn test_writer_checks_dimension() {
        let mut writer = RecordWriter::new(Vec::new(), 2).unwrap();
        let record = Record::new(Point::new(vec![1.0]), DataItem::from("x"));
        assert!(matches!(writer.write(&record), Err(SRTreeError::Config(_))));
        assert_eq!(writer.into_inner(), b"2\n".to_vec());
    }
}

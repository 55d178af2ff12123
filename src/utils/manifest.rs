// src/utils/manifest.rs: Sample manifest reading
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use crate::config::defs::{PipelineError, MANIFEST_FIELDS};


/// One manifest row. Fields are kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub line: usize,
    pub sample_id: String,
    pub description: String,
    pub read1: String,
    pub read2: String,
    pub genome: String,
    pub index: String,
    pub tssfile: String,
}

impl SampleRecord {
    /// Parses a single manifest line. Surrounding whitespace is trimmed before splitting on tabs.
    pub fn parse(line_no: usize, line: &str) -> Result<Self, PipelineError> {
        let fields: Vec<&str> = line.trim().split('\t').collect();
        if fields.len() != MANIFEST_FIELDS {
            return Err(PipelineError::MalformedManifestRow { line: line_no, found: fields.len() });
        }

        Ok(SampleRecord {
            line: line_no,
            sample_id: fields[0].to_string(),
            description: fields[1].to_string(),
            read1: fields[2].to_string(),
            read2: fields[3].to_string(),
            genome: fields[4].to_string(),
            index: fields[5].to_string(),
            tssfile: fields[6].to_string(),
        })
    }

    /// Per-sample output directory name, `<sample_id>-<description>`.
    pub fn output_dir_name(&self) -> String {
        format!("{}-{}", self.sample_id, self.description)
    }
}


/// Lazy reader yielding one `SampleRecord` per non-empty manifest line.
pub struct ManifestReader<R: BufRead> {
    path: PathBuf,
    lines: Lines<R>,
    line_no: usize,
}

impl ManifestReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        Ok(Self::new(path, BufReader::new(file)))
    }
}

impl<R: BufRead> ManifestReader<R> {
    pub fn new(path: &Path, reader: R) -> Self {
        ManifestReader {
            path: path.to_path_buf(),
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for ManifestReader<R> {
    type Item = Result<SampleRecord, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(PipelineError::io(&self.path, e))),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(SampleRecord::parse(self.line_no, &line));
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(contents: &str) -> ManifestReader<Cursor<Vec<u8>>> {
        ManifestReader::new(Path::new("samples.tsv"), Cursor::new(contents.as_bytes().to_vec()))
    }

    #[test]
    fn test_parse_row() {
        let record = SampleRecord::parse(1, "S1\tRepA\tr1.fq\tr2.fq\thg19\tidx\ttss.bed\n").unwrap();
        assert_eq!(record.sample_id, "S1");
        assert_eq!(record.description, "RepA");
        assert_eq!(record.read1, "r1.fq");
        assert_eq!(record.read2, "r2.fq");
        assert_eq!(record.genome, "hg19");
        assert_eq!(record.index, "idx");
        assert_eq!(record.tssfile, "tss.bed");
        assert_eq!(record.output_dir_name(), "S1-RepA");
    }

    #[test]
    fn test_wrong_arity() {
        let err = SampleRecord::parse(4, "S1\tRepA\tr1.fq").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedManifestRow { line: 4, found: 3 }));

        let err = SampleRecord::parse(5, "a\tb\tc\td\te\tf\tg\th").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedManifestRow { line: 5, found: 8 }));
    }

    #[test]
    fn test_reader_skips_blank_lines() {
        let records: Vec<_> = reader("S1\tA\tr1\tr2\thg19\ti\tt\n\n  \nS2\tB\tr1\tr2\tmm9\ti\tt\n")
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].sample_id, "S2");
        assert_eq!(records[1].line, 4);
    }

    #[test]
    fn test_reader_is_lazy() {
        let mut rows = reader("S1\tA\tr1\tr2\thg19\ti\tt\nbroken row\nS3\tC\tr1\tr2\thg19\ti\tt\n");
        assert!(rows.next().unwrap().is_ok());
        assert!(matches!(rows.next(), Some(Err(PipelineError::MalformedManifestRow { line: 2, .. }))));
        assert!(rows.next().unwrap().is_ok());
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_open_missing_file() {
        let res = ManifestReader::open(Path::new("/nonexistent/samples.tsv"));
        assert!(matches!(res, Err(PipelineError::Io { .. })));
    }
}

//! PAF (Pairwise Alignment Format) parsing
//!
//! Parses PAF alignment files into [`SyntenyRecord`]s. Supports both
//! uncompressed and BGZF-compressed input.

use crate::cigar::{self, CigarParseError};
use crate::record::{Strand, SyntenyRecord};
use log::debug;
use noodles::bgzf;
use std::fs::File;
use std::io::{BufRead, BufReader, Error as IoError, Read, Seek, SeekFrom};
use std::num::ParseIntError;

#[derive(Debug)]
pub enum ParseErr {
    NotEnoughFields,
    IoError(IoError),
    InvalidField(ParseIntError),
    InvalidStrand,
    InvalidCigarFormat,
    UnsupportedCigarOperation(char),
    InvalidFormat(String),
}

impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErr::NotEnoughFields => write!(f, "Not enough fields in PAF record"),
            ParseErr::IoError(e) => write!(f, "IO error: {}", e),
            ParseErr::InvalidField(e) => write!(f, "Invalid field: {}", e),
            ParseErr::InvalidStrand => write!(f, "Invalid strand"),
            ParseErr::InvalidCigarFormat => write!(f, "Invalid CIGAR format"),
            ParseErr::UnsupportedCigarOperation(op) => {
                write!(f, "Unsupported CIGAR operation: {}", op)
            }
            ParseErr::InvalidFormat(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ParseErr {}

impl From<CigarParseError> for ParseErr {
    fn from(e: CigarParseError) -> Self {
        match e {
            CigarParseError::UnsupportedOperation(op) => ParseErr::UnsupportedCigarOperation(op),
            CigarParseError::InvalidFormat => ParseErr::InvalidCigarFormat,
        }
    }
}

const BGZF_HEADER_SIZE: usize = 18;

/// Check whether a file starts with a valid BGZF header.
/// Returns `Ok(false)` for regular gzip, too-small files, or plain text.
fn is_bgzf<R: Read + Seek>(reader: &mut R) -> std::io::Result<bool> {
    let mut header = [0u8; BGZF_HEADER_SIZE];
    let result = match reader.read_exact(&mut header) {
        Ok(()) => {
            Ok(header[0..2] == [0x1f, 0x8b]      // gzip magic
                && header[2] == 0x08              // DEFLATE
                && header[3] == 0x04              // FEXTRA
                && header[10..12] == [0x06, 0x00] // XLEN=6
                && header[12..14] == [b'B', b'C'] // BC subfield
                && header[14..16] == [0x02, 0x00]) // SLEN=2
        }
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    };
    reader.seek(SeekFrom::Start(0))?;
    result
}

/// Parse a single PAF line: 12 mandatory columns plus optional `NN:T:value`
/// tags, of which only `cg:Z` (the CIGAR) is consumed.
pub fn parse_paf_line(line: &str) -> Result<SyntenyRecord, ParseErr> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 12 {
        return Err(ParseErr::NotEnoughFields);
    }

    let query_name = fields[0].to_string();
    let query_len = fields[1].parse::<u64>().map_err(ParseErr::InvalidField)?;
    let query_start = fields[2].parse::<u64>().map_err(ParseErr::InvalidField)?;
    let query_end = fields[3].parse::<u64>().map_err(ParseErr::InvalidField)?;
    let strand_char = fields[4]
        .chars()
        .next()
        .ok_or_else(|| ParseErr::InvalidFormat("Expected '+' or '-' for strand".to_string()))?;
    let strand = match strand_char {
        '+' => Strand::Forward,
        '-' => Strand::Reverse,
        _ => return Err(ParseErr::InvalidStrand),
    };
    let target_name = fields[5].to_string();
    let target_len = fields[6].parse::<u64>().map_err(ParseErr::InvalidField)?;
    let target_start = fields[7].parse::<u64>().map_err(ParseErr::InvalidField)?;
    let target_end = fields[8].parse::<u64>().map_err(ParseErr::InvalidField)?;
    let num_matches = fields[9].parse::<u64>().map_err(ParseErr::InvalidField)?;
    let block_len = fields[10].parse::<u64>().map_err(ParseErr::InvalidField)?;
    let mapping_qual = fields[11].parse::<u8>().map_err(ParseErr::InvalidField)?;

    let mut cigar = None;
    for tag in &fields[12..] {
        if let Some(cg) = tag.strip_prefix("cg:Z:") {
            cigar::parse_cigar_strict(cg)?;
            cigar = Some(cg.to_string());
            break;
        }
    }

    Ok(SyntenyRecord {
        query_name,
        query_len,
        query_start,
        query_end,
        strand,
        target_name,
        target_len,
        target_start,
        target_end,
        num_matches,
        block_len,
        mapping_qual,
        cigar,
        mean_score: None,
    })
}

pub fn parse_paf<R: BufRead>(reader: R) -> Result<Vec<SyntenyRecord>, ParseErr> {
    let mut records = Vec::new();
    for line_result in reader.lines() {
        let line = line_result.map_err(ParseErr::IoError)?;
        if line.is_empty() {
            continue;
        }
        records.push(parse_paf_line(&line)?);
    }
    Ok(records)
}

/// Parse a PAF file with automatic format detection (BGZF or plain text).
pub fn parse_paf_file(paf_file: &str) -> std::io::Result<Vec<SyntenyRecord>> {
    let mut file = File::open(paf_file)?;
    let records = if [".gz", ".bgz"].iter().any(|e| paf_file.ends_with(e)) {
        if !is_bgzf(&mut file)? {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "'{}' is regular gzip, not BGZF. Convert with: zcat '{}' | bgzip > output.paf.gz",
                    paf_file, paf_file
                ),
            ));
        }
        debug!("Reading {} as BGZF", paf_file);
        let reader = BufReader::new(bgzf::io::Reader::new(file));
        parse_paf(reader)
    } else {
        debug!("Reading {} as plain text", paf_file);
        parse_paf(BufReader::new(file))
    };
    records.map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to parse PAF from {}: {}", paf_file, e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paf_valid() {
        let line = "seq1\t100\t0\t100\t+\tseq2\t200\t50\t150\t60\t100\t255";
        let record = parse_paf_line(line).unwrap();

        assert_eq!(record.query_name, "seq1");
        assert_eq!(record.query_len, 100);
        assert_eq!((record.query_start, record.query_end), (0, 100));
        assert_eq!(record.strand, Strand::Forward);
        assert_eq!(record.target_name, "seq2");
        assert_eq!((record.target_start, record.target_end), (50, 150));
        assert_eq!(record.num_matches, 60);
        assert_eq!(record.block_len, 100);
        assert_eq!(record.mapping_qual, 255);
        assert_eq!(record.cigar, None);
    }

    #[test]
    fn test_parse_paf_with_cigar_tag() {
        let line = "seq1\t100\t0\t100\t-\tseq2\t100\t0\t100\t60\t100\t255\tNM:i:3\tcg:Z:50M2D48M";
        let record = parse_paf_line(line).unwrap();
        assert_eq!(record.strand, Strand::Reverse);
        assert_eq!(record.cigar.as_deref(), Some("50M2D48M"));
    }

    #[test]
    fn test_parse_paf_invalid() {
        // it's got a character 'z' in the target start field
        let line = "seq1\t100\t0\t100\t+\tseq2\t100\tz\t100\t60\t100\t255\tcg:Z:10M";
        assert!(parse_paf_line(line).is_err());
    }

    #[test]
    fn test_parse_paf_cigar_invalid() {
        // it's got Q in the CIGAR string
        let line = "seq1\t100\t0\t100\t+\tseq2\t100\t0\t100\t60\t100\t255\tcg:Z:10Q";
        assert!(matches!(
            parse_paf_line(line),
            Err(ParseErr::UnsupportedCigarOperation('Q'))
        ));
    }

    #[test]
    fn test_parse_paf_skips_blank_lines() {
        let text = "seq1\t100\t0\t100\t+\tseq2\t200\t0\t100\t60\t100\t60\n\nseq1\t100\t0\t100\t+\tseq3\t300\t0\t100\t55\t100\t60\n";
        let records = parse_paf(text.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].target_name, "seq3");
    }
}

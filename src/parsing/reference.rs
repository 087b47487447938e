
use anyhow::Context;
use indexmap::IndexMap;
use log::debug;
use noodles::core::{Position, Region};
use noodles::fasta;
use rust_lib_reference_genome::reference_genome::ReferenceGenome;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ReferenceLookupError {
    #[error("contig {contig:?} is not present in the reference")]
    UnknownContig { contig: String },
    #[error("{contig}:{position}+{length} is outside of the contig (length = {contig_length})")]
    OutOfRange { contig: String, position: u64, length: usize, contig_length: u64 },
    #[error("failed to read {contig}:{position}+{length} from the reference")]
    Io {
        contig: String,
        position: u64,
        length: usize,
        #[source]
        source: std::io::Error
    }
}

/// Random access to reference bases.
/// Positions are 0-based, and `length` bases are returned starting at `position`.
pub trait ReferenceProvider {
    /// Returns the reference bases in [position, position + length) on `contig`
    /// # Errors
    /// * if the contig is unknown
    /// * if the requested range extends past the end of the contig
    /// * if the underlying storage cannot be read
    fn fetch(&mut self, contig: &str, position: u64, length: usize) -> Result<Vec<u8>, ReferenceLookupError>;

    /// Returns all contig names, in reference order when the provider has one
    fn contig_names(&self) -> Vec<String>;
}

/// Checks a request against a known contig length
fn check_bounds(contig: &str, position: u64, length: usize, contig_length: u64) -> Result<(), ReferenceLookupError> {
    match position.checked_add(length as u64) {
        Some(end) if end <= contig_length => Ok(()),
        _ => Err(ReferenceLookupError::OutOfRange {
            contig: contig.to_string(), position, length, contig_length
        })
    }
}

/// A FASTA reader that leverages the .fai index to avoid loading the full reference into memory
pub struct IndexedFastaReference {
    /// The indexed reader from noodles
    reader: fasta::io::IndexedReader<BufReader<File>>,
    /// Contig lengths from the index, in index order
    contig_lengths: IndexMap<String, u64>
}

impl IndexedFastaReference {
    /// Opens a FASTA file with its index.
    /// # Arguments
    /// * `fasta_fn` - the uncompressed FASTA file
    /// * `index_fn` - optional explicit .fai path, defaults to `{fasta_fn}.fai`
    /// # Errors
    /// * if either file fails to open or the index fails to parse
    pub fn from_path(fasta_fn: &Path, index_fn: Option<&Path>) -> anyhow::Result<Self> {
        let index_fn: PathBuf = match index_fn {
            Some(p) => p.to_path_buf(),
            None => {
                let mut default_fn = fasta_fn.as_os_str().to_owned();
                default_fn.push(".fai");
                PathBuf::from(default_fn)
            }
        };

        debug!("Loading reference index from {index_fn:?}...");
        let index_reader = File::open(&index_fn)
            .map(BufReader::new)
            .with_context(|| format!("Error while opening {index_fn:?}:"))?;
        let index = fasta::fai::io::Reader::new(index_reader)
            .read_index()
            .with_context(|| format!("Error while parsing {index_fn:?}:"))?;

        let contig_lengths: IndexMap<String, u64> = index.as_ref().iter()
            .map(|record| (String::from_utf8_lossy(record.name()).to_string(), record.length()))
            .collect();
        debug!("Found {} contigs in reference index.", contig_lengths.len());

        let fasta_reader = File::open(fasta_fn)
            .map(BufReader::new)
            .with_context(|| format!("Error while opening {fasta_fn:?}:"))?;
        let reader = fasta::io::IndexedReader::new(fasta_reader, index);

        Ok(Self {
            reader,
            contig_lengths
        })
    }
}

impl ReferenceProvider for IndexedFastaReference {
    fn fetch(&mut self, contig: &str, position: u64, length: usize) -> Result<Vec<u8>, ReferenceLookupError> {
        let contig_length = *self.contig_lengths.get(contig)
            .ok_or_else(|| ReferenceLookupError::UnknownContig { contig: contig.to_string() })?;
        check_bounds(contig, position, length, contig_length)?;
        if length == 0 {
            return Ok(vec![]);
        }

        // noodles regions are 1-based and inclusive
        let out_of_range = || ReferenceLookupError::OutOfRange {
            contig: contig.to_string(), position, length, contig_length
        };
        let start = Position::new(position as usize + 1).ok_or_else(out_of_range)?;
        let end = Position::new(position as usize + length).ok_or_else(out_of_range)?;
        let region = Region::new(contig, start..=end);

        let record = self.reader.query(&region)
            .map_err(|source| ReferenceLookupError::Io {
                contig: contig.to_string(), position, length, source
            })?;
        Ok(record.sequence().as_ref().to_vec())
    }

    fn contig_names(&self) -> Vec<String> {
        self.contig_lengths.keys().cloned().collect()
    }
}

impl ReferenceProvider for ReferenceGenome {
    fn fetch(&mut self, contig: &str, position: u64, length: usize) -> Result<Vec<u8>, ReferenceLookupError> {
        // the underlying lookup panics on a missing contig, so check first
        if !self.contig_keys().iter().any(|k| k.as_str() == contig) {
            return Err(ReferenceLookupError::UnknownContig { contig: contig.to_string() });
        }

        let sequence = self.get_full_chromosome(contig);
        check_bounds(contig, position, length, sequence.len() as u64)?;
        let start = position as usize;
        Ok(sequence[start..(start + length)].to_vec())
    }

    fn contig_names(&self) -> Vec<String> {
        self.contig_keys().iter()
            .map(|k| k.to_string())
            .collect()
    }
}

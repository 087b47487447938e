
use anyhow::{anyhow, bail, Context};
use log::{debug, trace};
use noodles::vcf;
use noodles::vcf::variant::record::samples::keys::key as vcf_key;
use noodles::vcf::variant::record_buf::samples::sample::Value;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::data_types::call::Call;

/// Streams calls for one sample out of a VCF file, one call per record.
/// Records are read on demand, so dropping the iterator closes the file without reading the rest.
pub struct VcfCallIterator {
    /// The underlying VCF reader, plain text or bgzip
    vcf_reader: vcf::io::Reader<Box<dyn BufRead>>,
    /// Parsed VCF header
    vcf_header: vcf::Header,
    /// Index of the sample we are pulling genotypes from
    sample_index: usize,
    /// Re-used record buffer
    record: vcf::variant::RecordBuf,
    /// Input path, used for error messages
    filename: PathBuf,
    /// Number of records read so far
    records_read: u64,
    /// Set once the file is exhausted or an error was returned
    done: bool
}

impl VcfCallIterator {
    /// Opens a VCF file and locates the sample of interest.
    /// # Arguments
    /// * `filename` - the VCF file, .vcf or .vcf.gz
    /// * `sample` - the sample name to pull genotypes for; if None, the first sample is used
    /// # Errors
    /// * if the file cannot be opened or the header cannot be parsed
    /// * if the sample is not in the VCF, or the VCF has no samples at all
    pub fn new(filename: &Path, sample: Option<&str>) -> anyhow::Result<Self> {
        let mut vcf_reader = vcf::io::reader::Builder::default()
            .build_from_path(filename)
            .with_context(|| format!("Error while opening {filename:?}:"))?;
        let vcf_header = vcf_reader.read_header()
            .with_context(|| format!("Error while reading header of {filename:?}:"))?;

        let sample_index = match sample {
            Some(sample_name) => vcf_header.sample_names().get_index_of(sample_name)
                .ok_or(anyhow!("Sample name {sample_name:?} was not found in {filename:?}"))?,
            None => {
                if vcf_header.sample_names().is_empty() {
                    bail!("No samples were found in {filename:?}");
                }
                0
            }
        };
        debug!(
            "Reading calls for sample {:?} from {filename:?}",
            vcf_header.sample_names().get_index(sample_index)
        );

        Ok(Self {
            vcf_reader,
            vcf_header,
            sample_index,
            record: Default::default(),
            filename: filename.to_path_buf(),
            records_read: 0,
            done: false
        })
    }

    /// Reads records until one produces a call for our sample
    fn read_next_call(&mut self) -> anyhow::Result<Option<Call>> {
        loop {
            let bytes_read = self.vcf_reader.read_record_buf(&self.vcf_header, &mut self.record)
                .with_context(|| format!("Error while reading record #{} from {:?}:", self.records_read + 1, self.filename))?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.records_read += 1;

            let opt_call = parse_call(&self.record, self.sample_index)
                .with_context(|| format!("Error parsing call in {:?} record #{}: {:?}", self.filename, self.records_read, self.record))?;
            match opt_call {
                Some(call) => {
                    trace!("\tFound {call:?}");
                    return Ok(Some(call));
                },
                None => {
                    trace!("\tSkipping no-call record #{}", self.records_read);
                }
            }
        }
    }
}

impl Iterator for VcfCallIterator {
    type Item = anyhow::Result<Call>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_next_call() {
            Ok(Some(call)) => Some(Ok(call)),
            Ok(None) => {
                debug!("Finished reading {} records from {:?}", self.records_read, self.filename);
                self.done = true;
                None
            },
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Converts a VCF record into a call for one sample.
/// Returns None if the sample genotype is entirely missing (e.g. `./.`); missing slots in a partial genotype are dropped.
/// # Arguments
/// * `record` - the record to parse
/// * `sample_index` - index of the sample to pull genotypes from
fn parse_call(record: &vcf::variant::RecordBuf, sample_index: usize) -> anyhow::Result<Option<Call>> {
    let contig = record.reference_sequence_name().to_string();
    let pos = record.variant_start().ok_or(anyhow!("Missing POS"))?; // 1-based
    let position = (pos.get() - 1) as u64; // convert to 0-based

    let alleles: Vec<String> = std::iter::once(record.reference_bases().to_string())
        .chain(record.alternate_bases().as_ref().iter().cloned())
        .collect();

    let all_samples = record.samples();
    let sample = all_samples.get_index(sample_index)
        .ok_or(anyhow!("Missing sample #{sample_index}"))?;
    let gt = match sample.get(vcf_key::GENOTYPE) {
        Some(Some(gt)) => gt,
        Some(None) => return Ok(None),
        None => bail!("Missing GT")
    };

    let genotype = parse_genotype(gt)?;
    if genotype.is_empty() {
        return Ok(None);
    }

    let call = Call::new(contig, position, alleles, genotype)?;
    Ok(Some(call))
}

/// Parses the GT field of a record into the list of called allele indices, skipping missing alleles.
/// # Arguments
/// * `gt` - the GT field from the record
fn parse_genotype(gt: &Value) -> anyhow::Result<Vec<usize>> {
    match gt {
        Value::Genotype(genotype) => {
            Ok(genotype.as_ref().iter()
                .filter_map(|allele| allele.position())
                .collect())
        },
        other => bail!("GT field is not a genotype: {other:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "##fileformat=VCFv4.3
##contig=<ID=chr1,length=1000>
##contig=<ID=chr2,length=1000>
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsampleA\tsampleB
";

    fn write_vcf(folder: &Path, body: &str) -> PathBuf {
        let filename = folder.join("calls.vcf");
        let mut fp = std::fs::File::create(&filename).unwrap();
        write!(fp, "{HEADER}{body}").unwrap();
        filename
    }

    #[test]
    fn test_read_calls() {
        let folder = tempfile::tempdir().unwrap();
        let filename = write_vcf(folder.path(), "\
chr1\t100\t.\tA\tT\t.\tPASS\t.\tGT\t0/1\t1/1
chr1\t200\t.\tG\tC,GA\t.\tPASS\t.\tGT\t1|2\t./.
chr2\t5\t.\tAT\tA\t.\tPASS\t.\tGT\t./.\t0/1
chr2\t9\t.\tC\t.\t.\tPASS\t.\tGT\t./0\t0/0
");

        // default is the first sample
        let calls: Vec<Call> = VcfCallIterator::new(&filename, None).unwrap()
            .collect::<anyhow::Result<_>>().unwrap();
        assert_eq!(calls, vec![
            Call::new("chr1".to_string(), 99, vec!["A".to_string(), "T".to_string()], vec![0, 1]).unwrap(),
            Call::new("chr1".to_string(), 199, vec!["G".to_string(), "C".to_string(), "GA".to_string()], vec![1, 2]).unwrap(),
            Call::new("chr2".to_string(), 8, vec!["C".to_string()], vec![0]).unwrap(),
        ]);

        let calls: Vec<Call> = VcfCallIterator::new(&filename, Some("sampleB")).unwrap()
            .collect::<anyhow::Result<_>>().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].genotype(), &[1, 1]);
        assert_eq!(calls[1].key(), ("chr2", 4));
        assert_eq!(calls[2].genotype(), &[0, 0]);
    }

    #[test]
    fn test_missing_sample() {
        let folder = tempfile::tempdir().unwrap();
        let filename = write_vcf(folder.path(), "");
        assert!(VcfCallIterator::new(&filename, Some("sampleC")).is_err());
        assert_eq!(VcfCallIterator::new(&filename, None).unwrap().count(), 0);
    }

    #[test]
    fn test_malformed_record() {
        let folder = tempfile::tempdir().unwrap();
        let filename = write_vcf(folder.path(), "\
chr1\t100\t.\tA\tT\t.\tPASS\t.\tGT\t0/1\t1/1
chr1\tnot_a_position\t.\tA\tT\t.\tPASS\t.\tGT\t0/1\t1/1
chr1\t300\t.\tA\tT\t.\tPASS\t.\tGT\t0/1\t1/1
");
        let mut iter = VcfCallIterator::new(&filename, None).unwrap();
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_err());
        // fused after an error
        assert!(iter.next().is_none());
    }
}


use anyhow::{anyhow, bail};
use std::path::{Path, PathBuf};

use crate::data_types::call::Call;
use crate::data_types::outcome::Side;
use crate::parsing::api_source::{open_remote_callset, ApiConfig};
use crate::parsing::vcf_source::VcfCallIterator;

/// A lazy, single-pass sequence of calls from one side; errors are reported in-stream
pub type CallStream = Box<dyn Iterator<Item = anyhow::Result<Call>>>;

/// Where the calls for one side come from
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CallSourceSpec {
    /// A local VCF file, optionally narrowed to one sample
    VcfFile { path: PathBuf, sample: Option<String> },
    /// A remote call set, identified by its call set ID
    RemoteCallSet { callset_id: String }
}

impl CallSourceSpec {
    /// Resolves the user options for one side into exactly one source.
    /// # Arguments
    /// * `side` - the side being resolved, used in error messages
    /// * `vcf` - optional path to a VCF file
    /// * `sample` - optional sample name, only valid with a VCF file
    /// * `callset_id` - optional remote call set ID
    /// # Errors
    /// * if both or neither of `vcf` and `callset_id` are provided
    /// * if `sample` is provided with a remote call set
    pub fn resolve(side: Side, vcf: Option<&Path>, sample: Option<&str>, callset_id: Option<&str>) -> anyhow::Result<CallSourceSpec> {
        match (vcf, callset_id) {
            (Some(path), None) => Ok(CallSourceSpec::VcfFile {
                path: path.to_path_buf(),
                sample: sample.map(|s| s.to_string())
            }),
            (None, Some(callset_id)) => {
                if let Some(sample) = sample {
                    bail!("--{side}-sample {sample:?} cannot be combined with --{side}-callset-id, a call set already identifies one sample");
                }
                Ok(CallSourceSpec::RemoteCallSet { callset_id: callset_id.to_string() })
            },
            (None, None) => bail!("One of --{side}-vcf or --{side}-callset-id must be provided"),
            (Some(_), Some(_)) => bail!("Only one of --{side}-vcf or --{side}-callset-id may be provided")
        }
    }

    /// Opens the source as a lazy call stream.
    /// # Arguments
    /// * `api` - remote service configuration, required for remote call sets
    /// # Errors
    /// * if the file fails to open or parse its header
    /// * if a remote source is opened without an API configuration
    pub fn open(&self, api: Option<&ApiConfig>) -> anyhow::Result<CallStream> {
        match self {
            CallSourceSpec::VcfFile { path, sample } => {
                let iter = VcfCallIterator::new(path, sample.as_deref())?;
                Ok(Box::new(iter))
            },
            CallSourceSpec::RemoteCallSet { callset_id } => {
                let api = api.ok_or(anyhow!("Call set {callset_id:?} requires an API configuration"))?;
                let iter = open_remote_callset(api, callset_id)?;
                Ok(Box::new(iter))
            }
        }
    }

    /// Returns true if this source requires the remote service
    pub fn is_remote(&self) -> bool {
        matches!(self, CallSourceSpec::RemoteCallSet { .. })
    }
}

impl std::fmt::Display for CallSourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallSourceSpec::VcfFile { path, sample: Some(sample) } => write!(f, "{path:?} (sample {sample:?})"),
            CallSourceSpec::VcfFile { path, sample: None } => write!(f, "{path:?} (first sample)"),
            CallSourceSpec::RemoteCallSet { callset_id } => write!(f, "call set {callset_id:?}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let vcf = PathBuf::from("calls.vcf.gz");
        assert_eq!(
            CallSourceSpec::resolve(Side::Lhs, Some(vcf.as_path()), Some("HG002"), None).unwrap(),
            CallSourceSpec::VcfFile { path: vcf.clone(), sample: Some("HG002".to_string()) }
        );
        assert_eq!(
            CallSourceSpec::resolve(Side::Rhs, None, None, Some("cs1")).unwrap(),
            CallSourceSpec::RemoteCallSet { callset_id: "cs1".to_string() }
        );
        assert!(CallSourceSpec::resolve(Side::Rhs, None, None, Some("cs1")).unwrap().is_remote());
    }

    #[test]
    fn test_resolve_errors() {
        let vcf = PathBuf::from("calls.vcf.gz");
        let err = CallSourceSpec::resolve(Side::Lhs, None, None, None).unwrap_err();
        assert!(err.to_string().contains("--lhs-vcf"));
        let err = CallSourceSpec::resolve(Side::Rhs, Some(vcf.as_path()), None, Some("cs1")).unwrap_err();
        assert!(err.to_string().contains("--rhs-callset-id"));
        let err = CallSourceSpec::resolve(Side::Rhs, None, Some("HG002"), Some("cs1")).unwrap_err();
        assert!(err.to_string().contains("--rhs-sample"));
    }

    #[test]
    fn test_open_remote_without_api() {
        let spec = CallSourceSpec::RemoteCallSet { callset_id: "cs1".to_string() };
        assert!(spec.open(None).is_err());
    }
}

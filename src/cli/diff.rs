
use anyhow::bail;
use clap::Args;
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::core::{check_optional_filename, check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::data_types::outcome::Side;
use crate::equivalence::EquivalenceMode;
use crate::orderer::ContigOrderMode;
use crate::parsing::api_source::{ApiConfig, Credentials, DEFAULT_API_ROOT, DEFAULT_PAGE_SIZE};
use crate::parsing::call_source::CallSourceSpec;

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct DiffSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    calldiff_version: String,

    /// Reference FASTA file
    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "reference")]
    #[clap(value_name = "FASTA")]
    #[clap(help_heading = Some("Reference"))]
    pub reference_fn: PathBuf,

    /// Reference FASTA index [default: <FASTA>.fai]
    #[clap(long = "reference-index")]
    #[clap(value_name = "FAI")]
    #[clap(help_heading = Some("Reference"))]
    pub reference_index_fn: Option<PathBuf>,

    /// Loads the full reference into memory instead of using indexed lookups
    #[clap(long = "preload-reference")]
    #[clap(help_heading = Some("Reference"))]
    pub preload_reference: bool,

    /// Left variant call file (VCF)
    #[clap(long = "lhs-vcf")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input"))]
    pub lhs_vcf_filename: Option<PathBuf>,

    /// Left remote call set ID
    #[clap(long = "lhs-callset-id")]
    #[clap(value_name = "ID")]
    #[clap(help_heading = Some("Input"))]
    pub lhs_callset_id: Option<String>,

    /// The sample name to use in the left VCF [default: first sample]
    #[clap(long = "lhs-sample")]
    #[clap(value_name = "SAMPLE")]
    #[clap(help_heading = Some("Input"))]
    pub lhs_sample: Option<String>,

    /// Right variant call file (VCF)
    #[clap(long = "rhs-vcf")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input"))]
    pub rhs_vcf_filename: Option<PathBuf>,

    /// Right remote call set ID
    #[clap(long = "rhs-callset-id")]
    #[clap(value_name = "ID")]
    #[clap(help_heading = Some("Input"))]
    pub rhs_callset_id: Option<String>,

    /// The sample name to use in the right VCF [default: first sample]
    #[clap(long = "rhs-sample")]
    #[clap(value_name = "SAMPLE")]
    #[clap(help_heading = Some("Input"))]
    pub rhs_sample: Option<String>,

    /// Inputs are already sorted; streams calls without buffering and fails on out-of-order input
    #[clap(long = "presorted")]
    #[clap(help_heading = Some("Diff parameters"))]
    pub presorted: bool,

    /// Rule used to decide if calls at the same position match
    #[clap(long = "equivalence")]
    #[clap(value_name = "MODE")]
    #[clap(help_heading = Some("Diff parameters"))]
    #[clap(value_enum, default_value_t = EquivalenceMode::Normalized)]
    pub equivalence: EquivalenceMode,

    /// Contig order the inputs are sorted by
    #[clap(long = "contig-order")]
    #[clap(value_name = "ORDER")]
    #[clap(help_heading = Some("Diff parameters"))]
    #[clap(value_enum, default_value_t = ContigOrderMode::Lexicographic)]
    pub contig_order: ContigOrderMode,

    /// Stops the diff once this many non-matching positions (MISMATCH, LHS_ONLY, or RHS_ONLY) are found
    #[clap(long = "max-mismatches")]
    #[clap(value_name = "INT")]
    #[clap(help_heading = Some("Diff parameters"))]
    pub max_mismatches: Option<u64>,

    /// Root URL of the remote genomics service
    #[clap(long = "api-root-url")]
    #[clap(value_name = "URL")]
    #[clap(help_heading = Some("Remote call sets"))]
    #[clap(default_value = DEFAULT_API_ROOT)]
    pub api_root_url: String,

    /// API key for the remote service
    #[clap(long = "api-key")]
    #[clap(value_name = "KEY")]
    #[clap(help_heading = Some("Remote call sets"))]
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// OAuth access token for the remote service
    #[clap(long = "access-token")]
    #[clap(value_name = "TOKEN")]
    #[clap(help_heading = Some("Remote call sets"))]
    #[serde(skip_serializing)]
    pub access_token: Option<String>,

    /// Timeout for each remote request
    #[clap(long = "timeout-ms")]
    #[clap(value_name = "MS")]
    #[clap(help_heading = Some("Remote call sets"))]
    pub timeout_ms: Option<u64>,

    /// Number of variants requested per page
    #[clap(long = "page-size")]
    #[clap(value_name = "INT")]
    #[clap(help_heading = Some("Remote call sets"))]
    #[clap(default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Label for the report and summary output
    #[clap(long = "diff-label")]
    #[clap(value_name = "LABEL")]
    #[clap(help_heading = Some("Output"))]
    #[clap(default_value = "calldiff")]
    pub diff_label: String,

    /// Optional summary table (.tsv or .csv)
    #[clap(long = "output-summary")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Output"))]
    pub output_summary: Option<PathBuf>,

    /// Optional full statistics as JSON (.json or .json.gz)
    #[clap(long = "output-json")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Output"))]
    pub output_json: Option<PathBuf>,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

/// Settings after every choice has been resolved and validated
pub struct ResolvedDiffSettings {
    /// The user settings, with the version stamped in
    pub settings: DiffSettings,
    /// Where lhs calls come from
    pub lhs_source: CallSourceSpec,
    /// Where rhs calls come from
    pub rhs_source: CallSourceSpec,
    /// Remote service configuration, only present when a side is remote
    pub api_config: Option<ApiConfig>
}

/// Resolves one side and checks that a local VCF exists
fn resolve_side(
    side: Side, vcf: Option<&std::path::Path>, sample: Option<&str>, callset_id: Option<&str>
) -> anyhow::Result<CallSourceSpec> {
    let spec = CallSourceSpec::resolve(side, vcf, sample, callset_id)?;
    if let CallSourceSpec::VcfFile { path, .. } = &spec {
        check_required_filename(path, &format!("{} VCF", side.to_string().to_uppercase()))?;
    }
    info!("\t{} calls: {spec}", side.to_string().to_uppercase());
    Ok(spec)
}

/// Validates the settings and resolves them into sources and remote configuration.
/// Nothing is opened here beyond existence checks.
/// # Errors
/// * if a required file is missing
/// * if a side has zero or two sources, or a sample with a call set
/// * if a remote side lacks exactly one credential
/// * if a numeric option is out of bounds
pub fn check_diff_settings(mut settings: DiffSettings) -> anyhow::Result<ResolvedDiffSettings> {
    // hard code the version in
    settings.calldiff_version = FULL_VERSION.clone();
    info!("calldiff version: {:?}", &settings.calldiff_version);
    info!("Sub-command: diff");
    info!("Inputs:");

    // reference checks
    check_required_filename(&settings.reference_fn, "Reference FASTA")?;
    check_optional_filename(settings.reference_index_fn.as_deref(), "Reference index")?;
    if !settings.preload_reference && settings.reference_index_fn.is_none() {
        let mut default_index = settings.reference_fn.as_os_str().to_owned();
        default_index.push(".fai");
        check_required_filename(&PathBuf::from(default_index), "Reference index")?;
    }
    info!("\tReference: {:?}", &settings.reference_fn);
    if settings.preload_reference {
        info!("\tReference mode: preloaded");
    } else if let Some(index_fn) = settings.reference_index_fn.as_deref() {
        info!("\tReference index: {index_fn:?}");
    }

    // sources
    let lhs_source = resolve_side(
        Side::Lhs, settings.lhs_vcf_filename.as_deref(), settings.lhs_sample.as_deref(), settings.lhs_callset_id.as_deref()
    )?;
    let rhs_source = resolve_side(
        Side::Rhs, settings.rhs_vcf_filename.as_deref(), settings.rhs_sample.as_deref(), settings.rhs_callset_id.as_deref()
    )?;

    // remote configuration is only needed when a call set is used
    let api_config = if lhs_source.is_remote() || rhs_source.is_remote() {
        let credentials = Credentials::resolve(settings.api_key.as_deref(), settings.access_token.as_deref())?;
        if settings.page_size == 0 {
            bail!("--page-size must be >0");
        }
        if settings.timeout_ms == Some(0) {
            bail!("--timeout-ms must be >0");
        }
        info!("Remote call sets:");
        info!("\tAPI root: {:?}", &settings.api_root_url);
        info!("\tAuthentication: {}", match credentials {
            Credentials::ApiKey(_) => "API key",
            Credentials::AccessToken(_) => "access token"
        });
        info!("\tPage size: {}", settings.page_size);
        if let Some(timeout_ms) = settings.timeout_ms {
            info!("\tTimeout: {timeout_ms} ms");
        }
        Some(ApiConfig::new(
            &settings.api_root_url, credentials,
            settings.timeout_ms.map(Duration::from_millis),
            settings.page_size
        ))
    } else {
        if settings.api_key.is_some() || settings.access_token.is_some() {
            warn!("No remote call sets were provided, ignoring credentials.");
        }
        None
    };

    // diff parameters
    info!("Diff parameters:");
    info!("\tPresorted: {}", if settings.presorted { "ENABLED" } else { "DISABLED" });
    info!("\tEquivalence: {}", settings.equivalence);
    info!("\tContig order: {}", settings.contig_order);
    if let Some(max_mismatches) = settings.max_mismatches {
        if max_mismatches == 0 {
            bail!("--max-mismatches must be >0");
        }
        info!("\tMax mismatches: {max_mismatches}");
    }

    // outputs
    info!("Outputs:");
    info!("\tDiff label: {:?}", &settings.diff_label);
    if let Some(filename) = settings.output_summary.as_deref() {
        info!("\tSummary: {filename:?}");
    }
    if let Some(filename) = settings.output_json.as_deref() {
        info!("\tJSON: {filename:?}");
    }

    Ok(ResolvedDiffSettings {
        settings,
        lhs_source,
        rhs_source,
        api_config
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// Builds settings with an existing reference, index, and two VCFs
    fn local_settings(folder: &Path) -> DiffSettings {
        let reference_fn = folder.join("ref.fa");
        let lhs_fn = folder.join("lhs.vcf");
        let rhs_fn = folder.join("rhs.vcf");
        for filename in [&reference_fn, &folder.join("ref.fa.fai"), &lhs_fn, &rhs_fn] {
            std::fs::File::create(filename).unwrap();
        }
        DiffSettings {
            reference_fn,
            lhs_vcf_filename: Some(lhs_fn),
            rhs_vcf_filename: Some(rhs_fn),
            api_root_url: DEFAULT_API_ROOT.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            diff_label: "calldiff".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_local_settings() {
        let folder = tempfile::tempdir().unwrap();
        let mut settings = local_settings(folder.path());
        settings.rhs_sample = Some("HG002".to_string());
        // credentials are ignored without a remote side
        settings.api_key = Some("key".to_string());

        let resolved = check_diff_settings(settings).unwrap();
        assert!(matches!(resolved.lhs_source, CallSourceSpec::VcfFile { sample: None, .. }));
        assert!(matches!(resolved.rhs_source, CallSourceSpec::VcfFile { sample: Some(_), .. }));
        assert!(resolved.api_config.is_none());
        assert!(!resolved.settings.calldiff_version.is_empty());
    }

    #[test]
    fn test_remote_settings() {
        let folder = tempfile::tempdir().unwrap();
        let mut settings = local_settings(folder.path());
        settings.rhs_vcf_filename = None;
        settings.rhs_callset_id = Some("cs1".to_string());

        // missing credentials
        assert!(check_diff_settings(settings.clone()).is_err());

        // conflicting credentials
        settings.api_key = Some("key".to_string());
        settings.access_token = Some("token".to_string());
        assert!(check_diff_settings(settings.clone()).is_err());

        settings.access_token = None;
        settings.timeout_ms = Some(500);
        let resolved = check_diff_settings(settings.clone()).unwrap();
        let api = resolved.api_config.unwrap();
        assert_eq!(api.credentials(), &Credentials::ApiKey("key".to_string()));
        assert_eq!(api.timeout(), Some(Duration::from_millis(500)));
        assert_eq!(api.page_size(), DEFAULT_PAGE_SIZE);

        settings.page_size = 0;
        assert!(check_diff_settings(settings).is_err());
    }

    #[test]
    fn test_invalid_settings() {
        let folder = tempfile::tempdir().unwrap();

        // both sources on one side
        let mut settings = local_settings(folder.path());
        settings.lhs_callset_id = Some("cs1".to_string());
        assert!(check_diff_settings(settings).is_err());

        // no source on one side
        let mut settings = local_settings(folder.path());
        settings.rhs_vcf_filename = None;
        assert!(check_diff_settings(settings).is_err());

        // missing VCF
        let mut settings = local_settings(folder.path());
        settings.lhs_vcf_filename = Some(folder.path().join("missing.vcf"));
        assert!(check_diff_settings(settings).is_err());

        // missing default index, unless preloading
        let mut settings = local_settings(folder.path());
        std::fs::remove_file(folder.path().join("ref.fa.fai")).unwrap();
        assert!(check_diff_settings(settings.clone()).is_err());
        settings.preload_reference = true;
        assert!(check_diff_settings(settings).is_ok());

        // zero mismatches
        let mut settings = local_settings(folder.path());
        settings.max_mismatches = Some(0);
        assert!(check_diff_settings(settings).is_err());
    }
}

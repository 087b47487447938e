/*!
# Parsing module
Contains the collaborators that turn inputs into calls and reference bases.
*/
/// Tagged choice of call source and the shared stream type
pub mod call_source;
/// Paged remote call-set client
pub mod api_source;
/// Reference sequence providers, indexed FASTA or fully loaded
pub mod reference;
/// Streaming VCF call reader
pub mod vcf_source;

//! File-format adapters (§6): binary self-describing DAG, legacy
//! protobuf-era DAG/tree, JSON DAG, VCF ingestion, and FASTA reference
//! loading.
mod byteio;

pub mod dagbin;
pub mod fasta;
pub mod json;
pub mod protobuf;
pub mod vcf;

//! The two retrospective studies, composed from the pipeline stages
//!
//! Each study is a straight line: extract → filter to cohort → derive →
//! tabulate/test. Nothing here carries state between runs; every run is a
//! fresh read-only pass over its sources.

pub mod sodium_osmolarity;
pub mod transfusion;

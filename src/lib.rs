#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod accumulate;
pub mod pipeline;
pub mod report;
pub mod scorefile;
pub mod types;
pub mod vcf;

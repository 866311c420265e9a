pub mod ctc_decode;
pub mod der;
pub mod report;
pub mod rttm;
pub mod silence;
pub mod speaker;
pub mod word_timing;

pub mod anonymize;
pub mod ocr;
pub mod poll;
pub mod probes;

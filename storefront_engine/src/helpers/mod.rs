mod reference_code;

pub use reference_code::{extract_reference, new_reference_code, MemoReference};

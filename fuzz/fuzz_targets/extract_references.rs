#![no_main]

use libfuzzer_sys::fuzz_target;
use twbgraph_core::extract_references;

fuzz_target!(|data: &[u8]| {
    let Ok(formula) = std::str::from_utf8(data) else {
        return;
    };
    let refs = extract_references(formula);
    for field in &refs.fields {
        assert!(field.starts_with('[') && field.ends_with(']'));
    }
});

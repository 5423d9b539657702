//! Fuzz target: `extract_boundary_token`
//!
//! Arbitrary `content-type` values must never panic and any token returned
//! must be a usable delimiter.
//!
//! cargo fuzz run fuzz_boundary_header

#![no_main]

use avslink::multipart::boundary::{MAX_BOUNDARY_LEN, extract_boundary_token, is_valid_boundary};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = std::str::from_utf8(data) else {
        return;
    };
    if let Some(token) = extract_boundary_token(value) {
        assert!(token.starts_with("--"));
        assert!(token.len() > 2);
        assert!(token.len() <= MAX_BOUNDARY_LEN + 2);
        assert!(is_valid_boundary(&token[2..]));
    }
});

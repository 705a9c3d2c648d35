#![cfg_attr(fuzzing, no_main)]

// Workspace test builds compile this binary without the fuzzing cfg.
#[cfg(not(fuzzing))]
fn main() {}

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;
#[cfg(fuzzing)]
use treelens_core::{decode_with, encode_tree, DecodeOptions};

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    if data.len() > 100_000 || data.len() < 2 {
        return;
    }

    // First two bytes pick the split between primary and aux blobs
    let split = u16::from_le_bytes([data[0], data[1]]) as usize;
    let body = &data[2..];
    let (primary, aux) = body.split_at(split.min(body.len()));

    let features: Vec<String> = (0..8).map(|i| format!("f{i}")).collect();
    let domains: Vec<Option<Vec<String>>> = (0..8)
        .map(|i| (i % 2 == 1).then(|| (0..40).map(|l| format!("l{l}")).collect()))
        .collect();

    // Must never panic, only return Result
    let options = DecodeOptions {
        check_na_routing: true,
    };
    if let Ok(tree) = decode_with(primary, aux, &features, &domains, &options) {
        // Anything that decodes must survive a re-encode
        if let Ok(blob) = encode_tree(&tree) {
            let again = blob.decode(&features, &domains);
            assert!(again.is_ok(), "re-encoded tree failed to decode");
        }
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use pathkv::path;

// `normalize` must never panic on arbitrary input, and any path it accepts
// must round-trip through `segments`/`Display` without losing or
// reordering segments.
fuzz_target!(|input: &str| {
    let Ok(normalized) = path::normalize(input) else {
        return;
    };
    let rendered = normalized.to_string();
    let Ok(reparsed) = path::normalize(&rendered) else {
        panic!("normalized path failed to re-normalize: {rendered:?}");
    };
    assert_eq!(path::segments(&normalized), path::segments(&reparsed));
});

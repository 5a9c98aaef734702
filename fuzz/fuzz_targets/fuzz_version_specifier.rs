#![no_main]

use libfuzzer_sys::fuzz_target;
use lockwright_core::{Version, VersionSpecifiers};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    // Versions must survive a display round trip once parsed.
    if let Some(version) = Version::parse(s) {
        let reparsed = Version::parse(&version.to_string());
        assert_eq!(reparsed.as_ref(), Some(&version));
    }

    let Ok(specifier) = VersionSpecifiers::parse(s) else {
        return;
    };

    let test_versions = ["0", "0.0.1", "1.0", "1.0a1", "1.0.post1", "1.0+local", "2.0.dev3", "1!1.0"];
    for raw in test_versions {
        if let Some(version) = Version::parse(raw) {
            let _ = specifier.contains(&version);
        }
    }

    // Display output parses back to the same set of versions.
    let rendered = specifier.to_string();
    let reparsed = VersionSpecifiers::parse(&rendered).expect("rendered specifier parses");
    assert_eq!(reparsed.is_empty(), specifier.is_empty());

    let _ = specifier.intersection(&reparsed);
    let _ = specifier.exact_version();
});

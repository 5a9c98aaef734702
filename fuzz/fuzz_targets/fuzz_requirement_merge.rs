#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lockwright_core::Version;
use lockwright_resolver::Requirement;

#[derive(Debug, Arbitrary)]
struct MergeInput<'a> {
    left: &'a str,
    right: &'a str,
    version: &'a str,
}

fuzz_target!(|input: MergeInput<'_>| {
    let (Ok(left), Ok(right)) = (
        Requirement::parse(&format!("pkg{}", input.left)),
        Requirement::parse(&format!("pkg{}", input.right)),
    ) else {
        return;
    };
    let Some(version) = Version::parse(input.version) else {
        return;
    };

    let both = left.specifier.contains(&version) && right.specifier.contains(&version);
    match left.merge(&right) {
        Ok(merged) => assert_eq!(merged.specifier.contains(&version), both),
        Err(_) => assert!(!both),
    }
});

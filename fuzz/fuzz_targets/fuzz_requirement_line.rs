#![no_main]

use libfuzzer_sys::fuzz_target;
use lockwright_lockfile::format_requirement;
use lockwright_resolver::Requirement;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(requirement) = Requirement::parse(line) else {
        return;
    };

    // Rendered requirements parse back to the same requirement.
    let rendered = requirement.to_string();
    let reparsed = Requirement::parse(&rendered).expect("rendered requirement parses");
    assert_eq!(reparsed.name, requirement.name);
    assert_eq!(reparsed.extras, requirement.extras);
    assert_eq!(reparsed.editable, requirement.editable);

    let _ = format_requirement(&requirement, None);
    let _ = requirement.merge(&reparsed);
    let _ = requirement.is_satisfied_by(&reparsed);
});

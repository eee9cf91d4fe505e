//! Ansible warning and deprecation patterns.

use crate::catalogue::{PatternCatalogue, RegexBundle};

// A block runs until the next bracketed line or a blank line.
const PATTERNS: &[(&str, &str)] = &[
    (
        "ansible warning",
        r"^\[WARNING\]:\s*(?P<warning_text>(?:.*?\n)+?)(?=^\[.*|\s*\n)",
    ),
    (
        "ansible deprecation",
        r"^\[DEPRECATION WARNING\]:\s*(?P<deprecation_text>(?:.*?\n)+?)(?=^\[.*|\s*\n)",
    ),
];

pub struct AnsibleRegexBundle;

impl RegexBundle for AnsibleRegexBundle {
    fn name(&self) -> &str {
        "ansible"
    }

    fn get_regex(&self, catalogue: &mut PatternCatalogue) {
        for (name, pattern) in PATTERNS {
            catalogue.push_builtin(name, pattern);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_and_deprecation_blocks() {
        let text = "\
[WARNING]: Could not match supplied host pattern, ignoring:
all_servers

[DEPRECATION WARNING]: The TRANSFORM_INVALID_GROUP_CHARS default is changing.
This feature will be removed in version 2.10.
[WARNING]: second warning
";
        let mut catalogue = PatternCatalogue::new();
        AnsibleRegexBundle.get_regex(&mut catalogue);
        let matches = catalogue.scan(text);

        let warnings: Vec<_> = matches.iter().filter(|m| m.name == "ansible warning").collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].named_matches["warning_text"],
            "Could not match supplied host pattern, ignoring:\nall_servers\n"
        );

        let deprecations: Vec<_> = matches
            .iter()
            .filter(|m| m.name == "ansible deprecation")
            .collect();
        assert_eq!(deprecations.len(), 1);
        assert_eq!(
            deprecations[0].named_matches["deprecation_text"],
            "The TRANSFORM_INVALID_GROUP_CHARS default is changing.\nThis feature will be removed in version 2.10.\n"
        );
    }
}

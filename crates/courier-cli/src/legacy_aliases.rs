//! Rewrites the single-dash flag spellings older scripts still pass.

const LEGACY_FLAGS: [(&str, &str); 3] = [
    ("-output", "--output"),
    ("-post", "--post"),
    ("-keep", "--keep"),
];

fn normalize_argument(argument: &str) -> Option<String> {
    for (legacy, current) in LEGACY_FLAGS {
        if argument == legacy {
            return Some(current.to_string());
        }
        if let Some(value) = argument
            .strip_prefix(legacy)
            .and_then(|rest| rest.strip_prefix('='))
        {
            return Some(format!("{current}={value}"));
        }
    }
    None
}

/// Maps `-output`, `-post`, and `-keep` onto their `--` forms.
///
/// Arguments after a bare `--` are left untouched.
pub fn normalize_legacy_archive_flags(args: Vec<String>) -> Vec<String> {
    let mut normalized = Vec::with_capacity(args.len());
    let mut passthrough = false;
    for argument in args {
        if passthrough {
            normalized.push(argument);
            continue;
        }
        if argument == "--" {
            passthrough = true;
            normalized.push(argument);
            continue;
        }
        match normalize_argument(&argument) {
            Some(rewritten) => normalized.push(rewritten),
            None => normalized.push(argument),
        }
    }
    normalized
}

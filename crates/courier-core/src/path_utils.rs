/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_for_path(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Uppercases the first letter of every alphabetic run and lowercases the rest.
///
/// `"eng-release_notes"` becomes `"Eng-Release_Notes"`.
pub fn title_case(raw: &str) -> String {
    let mut titled = String::with_capacity(raw.len());
    let mut previous_is_alpha = false;
    for ch in raw.chars() {
        if ch.is_alphabetic() {
            if previous_is_alpha {
                titled.extend(ch.to_lowercase());
            } else {
                titled.extend(ch.to_uppercase());
            }
            previous_is_alpha = true;
        } else {
            titled.push(ch);
            previous_is_alpha = false;
        }
    }
    titled
}

/// Returns `name` or the first free `"stem (n).ext"` variant not present in `taken`.
pub fn unique_filename<S: AsRef<str>>(name: &str, taken: &[S]) -> String {
    let is_taken = |candidate: &str| taken.iter().any(|existing| existing.as_ref() == candidate);
    if !is_taken(name) {
        return name.to_string();
    }
    let (stem, extension) = split_extension(name);
    let mut counter = 1_usize;
    loop {
        let candidate = format!("{stem} ({counter}){extension}");
        if !is_taken(&candidate) {
            return candidate;
        }
        counter = counter.saturating_add(1);
    }
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}

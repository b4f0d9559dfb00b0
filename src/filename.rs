// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Output filename generation.
//!
//! Uploaded objects share one flat namespace per month, so names need to be
//! unique. A short random id is appended to the stem of every name unless
//! the stem already ends in something that looks like one.
//!
//! # Random Suffix Heuristic
//!
//! Whether a stem "already ends in a random id" is only guessed, by matching
//! the last dash separated segment against the id alphabet and length. A
//! human chosen name can match by accident, in which case no id is appended
//! and collisions become possible. The guess also requires a digit or an
//! inner capital letter, so plain words like "vacation" still get an id.

use crate::{config::FilenamePolicy, media::extension_for_mime};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::path::Path;

/// Characters random ids are drawn from.
pub const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Length of random ids.
pub const ID_LENGTH: usize = 8;

static RANDOM_SUFFIX: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?:^|-)([A-Za-z0-9_-]{8})$").ok());

/// Generate random id of target length from [`ID_ALPHABET`].
pub fn random_id(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())]))
        .collect()
}

/// Check if stem already ends in what looks like a random id.
pub fn has_random_suffix(stem: &str) -> bool {
    RANDOM_SUFFIX
        .as_ref()
        .and_then(|suffix| suffix.captures(stem))
        .and_then(|captures| captures.get(1))
        .is_some_and(|id| {
            let id = id.as_str();
            id.chars().any(|c| c.is_ascii_digit())
                || id.chars().skip(1).any(|c| c.is_ascii_uppercase())
        })
}

/// Lowercase stem and collapse every run of non-alphanumerics into a dash.
pub fn normalize_stem(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }

    out.trim_matches('-').to_string()
}

/// Produce final output filename.
///
/// The stem comes from the explicit name, then the original filename, then
/// a timestamp. The extension always follows the MIME type of the processed
/// buffer, except for unknown binary data where the original extension is
/// kept.
pub fn generate_filename(
    original: Option<&str>,
    mime: &str,
    policy: &FilenamePolicy,
    now: DateTime<Utc>,
) -> String {
    let source = policy.name.as_deref().or(original);
    let (stem, original_ext) = match source {
        Some(name) => {
            let path = Path::new(name);
            let stem = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            let ext = path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase());
            (stem, ext)
        }
        None => (String::new(), None),
    };

    let mut stem = if policy.random {
        random_id(ID_LENGTH)
    } else if policy.normalize {
        normalize_stem(&stem)
    } else {
        stem.trim().to_string()
    };
    if stem.is_empty() {
        stem = format!("share-{}", now.format("%Y%m%d-%H%M%S"));
    }

    if !policy.random && !has_random_suffix(&stem) {
        stem = format!("{stem}-{}", random_id(ID_LENGTH));
    }

    let ext = match (extension_for_mime(mime), original_ext) {
        ("bin", Some(original)) if !original.is_empty() => original,
        (ext, _) => ext.to_string(),
    };

    format!("{stem}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).single().unwrap_or_default()
    }

    fn policy(random: bool, normalize: bool, name: Option<&str>) -> FilenamePolicy {
        FilenamePolicy {
            random,
            normalize,
            name: name.map(String::from),
        }
    }

    /// Split "stem-ID.ext" into its three parts.
    fn split_id(filename: &str) -> (&str, &str, &str) {
        let (rest, ext) = filename.rsplit_once('.').unwrap_or((filename, ""));
        let at = rest.len().saturating_sub(ID_LENGTH + 1);
        (&rest[..at], &rest[at + 1..], ext)
    }

    #[test]
    fn random_id_uses_alphabet() {
        let id = random_id(ID_LENGTH);
        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.bytes().all(|b| ID_ALPHABET.contains(&b)));
        assert_ne!(random_id(32), random_id(32));
    }

    #[test_case("clip-a1B2c3D4", true; "dashed id")]
    #[test_case("x7Kp2Qa9", true; "bare id")]
    #[test_case("vacation", false; "plain word")]
    #[test_case("summer-vacation", false; "plain words")]
    #[test_case("clip-a1B2c3", false; "too short")]
    #[test_case("clipa1B2c3D4", false; "no separator")]
    #[test_case("trip-McDonald", true; "inner capital")]
    #[test]
    fn random_suffix_heuristic(stem: &str, expect: bool) {
        pretty_assertions::assert_eq!(has_random_suffix(stem), expect);
    }

    #[test_case("My Vacation Photo!!", "my-vacation-photo"; "spaces and punctuation")]
    #[test_case("--Already__Slugged--", "already-slugged"; "edges trimmed")]
    #[test_case("ÜBER Straße", "über-straße"; "unicode kept")]
    #[test]
    fn normalize(stem: &str, expect: &str) {
        pretty_assertions::assert_eq!(normalize_stem(stem), expect);
    }

    #[test]
    fn keeps_original_stem_and_appends_id() {
        let name = generate_filename(Some("Screen Shot.MOV"), "video/mp4", &policy(false, false, None), now());
        let (stem, id, ext) = split_id(&name);
        assert_eq!((stem, ext), ("Screen Shot", "mp4"));
        assert!(id.bytes().all(|b| ID_ALPHABET.contains(&b)));
    }

    #[test]
    fn explicit_name_wins_and_is_normalized() {
        let name = generate_filename(
            Some("IMG_0001.heic"),
            "image/jpeg",
            &policy(false, true, Some("Birthday Cake")),
            now(),
        );
        let (stem, _, ext) = split_id(&name);
        assert_eq!((stem, ext), ("birthday-cake", "jpg"));
    }

    #[test]
    fn existing_suffix_is_not_doubled() {
        let name = generate_filename(Some("clip-a1B2c3D4.mp4"), "video/mp4", &policy(false, false, None), now());
        assert_eq!(name, "clip-a1B2c3D4.mp4");
    }

    #[test]
    fn random_policy_replaces_stem() {
        let name = generate_filename(Some("secret plans.png"), "image/png", &policy(true, false, None), now());
        let (rest, ext) = name.rsplit_once('.').unwrap_or_default();
        assert_eq!(ext, "png");
        assert_eq!(rest.len(), ID_LENGTH);
        assert!(!name.contains("secret"));
    }

    #[test]
    fn nameless_source_gets_timestamp() {
        let name = generate_filename(None, "image/png", &policy(false, false, None), now());
        let (stem, _, ext) = split_id(&name);
        assert_eq!((stem, ext), ("share-20250314-150926", "png"));
    }

    #[test]
    fn unknown_binary_keeps_original_extension() {
        let name = generate_filename(
            Some("archive.tar.zst"),
            "application/octet-stream",
            &policy(false, false, None),
            now(),
        );
        assert!(name.starts_with("archive.tar-"));
        assert!(name.ends_with(".zst"));
    }
}

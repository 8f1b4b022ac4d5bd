//! Accepted-locale list derivation from the process environment.
//!
//! The list feeds `xml:lang` pruning: a locale entry such as `en_US.UTF-8`
//! expands into progressively less specific variants (`en_US.UTF-8`,
//! `en_US`, `en`) so that a document tagged `xml:lang="en"` survives under
//! an `en_US` environment.

use std::env;

/// Derive the accepted-locale list from the environment.
///
/// `LANGUAGE` (a colon-separated priority list) wins over `LC_ALL`,
/// `LC_MESSAGES` and `LANG`, in that order. Every entry is expanded into
/// its variants and the `"C"` locale is always accepted.
pub(crate) fn process_locales() -> Vec<String> {
    let raw = env::var("LANGUAGE")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| env::var("LC_ALL").ok().filter(|v| !v.is_empty()))
        .or_else(|| env::var("LC_MESSAGES").ok().filter(|v| !v.is_empty()))
        .or_else(|| env::var("LANG").ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "C".to_string());

    let mut locales = Vec::new();
    for entry in raw.split(':').filter(|e| !e.is_empty()) {
        expand_variants(entry, &mut locales);
    }
    push_unique(&mut locales, "C");
    locales
}

/// Expand one locale entry of the form `language[_TERRITORY][.codeset][@modifier]`
/// into its variants, most specific first.
pub(crate) fn expand_variants(entry: &str, out: &mut Vec<String>) {
    push_unique(out, entry);

    // strip the codeset, keeping any modifier
    let (base, modifier) = match entry.split_once('@') {
        Some((base, modifier)) => (base, Some(modifier)),
        None => (entry, None),
    };
    let no_codeset = match base.split_once('.') {
        Some((prefix, _)) => prefix,
        None => base,
    };
    if let Some(modifier) = modifier {
        push_unique(out, &format!("{no_codeset}@{modifier}"));
    }
    push_unique(out, no_codeset);

    // strip the territory
    if let Some((language, _)) = no_codeset.split_once('_') {
        push_unique(out, language);
    }
}

fn push_unique(out: &mut Vec<String>, locale: &str) {
    if !out.iter().any(|l| l == locale) {
        out.push(locale.to_string());
    }
}

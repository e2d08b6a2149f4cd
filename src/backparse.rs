//! Fragment Back-Parser: recovers a previously written dependency list
//! from an existing `.d` fragment's text, given the template that
//! produced it.

use regex::RegexBuilder;

use crate::fragment::{PLACEHOLDER_BASENAME, PLACEHOLDER_DEPENDENTS, PLACEHOLDER_EXT, PLACEHOLDER_NAME};
use crate::pathutil::{basename, normalize, stem_ext};

// Markers must contain only word characters so `regex::escape` leaves
// them untouched, letting us substitute the real patterns back in after
// escaping the rest of the template literally.
const BASENAME_MARKER: &str = "DEPGENMARKERBASENAME";
const NAME_MARKER: &str = "DEPGENMARKERNAME";
const EXT_MARKER: &str = "DEPGENMARKEREXT";
const DEPENDENTS_MARKER: &str = "DEPGENMARKERDEPENDENTS";

/// Recovers the dependency token list previously written into
/// `fragment_text` for `src_path`, using `template` to know where the
/// dependents field sits. Returns `None` if the template doesn't match
/// or the captured field is empty.
pub fn back_parse(template: &str, fragment_text: &str, src_path: &str) -> Option<Vec<String>> {
    let src_basename = basename(src_path);
    let (stem, ext) = stem_ext(&src_basename);

    let marked = template
        .replace(PLACEHOLDER_BASENAME, BASENAME_MARKER)
        .replace(PLACEHOLDER_NAME, NAME_MARKER)
        .replace(PLACEHOLDER_EXT, EXT_MARKER)
        .replace(PLACEHOLDER_DEPENDENTS, DEPENDENTS_MARKER);

    let escaped = regex::escape(&marked);

    let pattern = escaped
        .replace(BASENAME_MARKER, &regex::escape(&src_basename))
        .replace(NAME_MARKER, &regex::escape(stem))
        .replace(EXT_MARKER, &regex::escape(ext))
        .replace(DEPENDENTS_MARKER, r"([^\n\r]+)");

    let anchored = format!("^{pattern}$");
    let re = RegexBuilder::new(&anchored)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .ok()?;

    let caps = re.captures(fragment_text)?;
    let group = caps.get(1)?.as_str().trim();
    if group.is_empty() {
        return None;
    }

    Some(group.split(' ').filter(|s| !s.is_empty()).map(normalize).collect())
}

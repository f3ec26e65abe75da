//! Phrase windows and phrasematches for one source.
//!
//! Every contiguous run of query tokens is a candidate phrase. Address
//! sources also try numeric-class variants so house numbers can match a
//! street generically (`100 main street` -> `1## main street`). The source's
//! phrase dictionary is consulted exactly once per query: one windows call
//! for ordinary sources, one multi call with every window for address sources.
//!
//! ```text
//! "100 main street" (address source)
//!
//! len 3   100 main street   1## main street
//! len 2   100 main   main street   1## main
//! len 1   100   main   street   1##
//!            │
//!            └─ fuzzy_match_multi(all windows) ─> Phrasematch { phrase, mask, weight }
//! ```

use super::mask::{is_contiguous, original_mask, required_masks, span_mask, splits};
use crate::config::SourceFlags;
use crate::error::Result;
use crate::fuzzy::{EndingType, PhraseLookup};
use crate::text::{TokenizedQuery, numeric_class};
use crate::{PhraseWindow, Phrasematch};
use std::collections::HashMap;

/// Edit-distance budget and prefix policy for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzyParams {
    pub max_word_dist: u8,
    pub max_phrase_dist: u8,
    pub autocomplete: bool,
}

impl FuzzyParams {
    pub const EXACT: FuzzyParams = FuzzyParams { max_word_dist: 0, max_phrase_dist: 0, autocomplete: false };

    fn ending(&self, ender: bool) -> EndingType {
        if ender && self.autocomplete { EndingType::AnyPrefix } else { EndingType::NonPrefix }
    }
}

/// All valid phrase windows of `query`, longest first.
///
/// Windows that split a multi-token replacement, or whose original positions
/// are not contiguous, are dropped. With [`SourceFlags::ADDRESS`], each length
/// group is followed by its numeric-class variants.
pub fn permutations(query: &TokenizedQuery, flags: SourceFlags, autocomplete: bool) -> Vec<PhraseWindow> {
    let tokens = &query.tokens;
    let n = tokens.len();
    let required = required_masks(&query.owner);
    let params = FuzzyParams { autocomplete, ..FuzzyParams::EXACT };
    let mut out = Vec::new();

    for len in (1..=n).rev() {
        let mut group = Vec::new();
        for start in 0..=n - len {
            let span = span_mask(start, len);
            if required.iter().any(|&r| splits(span, r)) {
                continue;
            }
            let mask = original_mask(&query.owner, start, len);
            if !is_contiguous(mask) {
                continue;
            }
            let ender = start + len == n;
            group.push(PhraseWindow {
                tokens: tokens[start..start + len].to_vec(),
                mask,
                ender,
                ending_type: params.ending(ender),
            });
        }

        let variants: Vec<PhraseWindow> = if flags.contains(SourceFlags::ADDRESS) {
            group.iter().flat_map(|w| numeric_variants(w, &params)).collect()
        } else {
            Vec::new()
        };
        out.extend(group);
        out.extend(variants);
    }
    out
}

/// Numeric-class forms of a window: a leading number becomes its class in
/// place, a trailing number moves to the front as its class.
fn numeric_variants(window: &PhraseWindow, params: &FuzzyParams) -> Vec<PhraseWindow> {
    let mut out = Vec::new();
    let tokens = &window.tokens;

    if let Some(class) = tokens.first().and_then(|t| numeric_class(t)) {
        let mut variant = tokens.clone();
        variant[0] = class;
        out.push(PhraseWindow { tokens: variant, ..window.clone() });
    }

    if tokens.len() >= 2 {
        if let Some(class) = tokens.last().and_then(|t| numeric_class(t)) {
            let mut variant = Vec::with_capacity(tokens.len());
            variant.push(class);
            variant.extend(tokens[..tokens.len() - 1].iter().cloned());
            let ending_type = params.ending(false);
            out.push(PhraseWindow { tokens: variant, mask: window.mask, ender: false, ending_type });
        }
    }
    out
}

/// Match `query` against one source's phrase dictionary.
///
/// An empty query yields no phrasematches and never reaches the dictionary.
pub fn phrasematch(
    query: &TokenizedQuery,
    flags: SourceFlags,
    lookup: &dyn PhraseLookup,
    params: FuzzyParams,
) -> Result<Vec<Phrasematch>> {
    let token_count = query.token_count();
    if query.is_empty() || token_count == 0 {
        return Ok(Vec::new());
    }
    let weight_of = |mask: u32| f64::from(mask.count_ones()) / token_count as f64;
    let mut found = Vec::new();

    if flags.contains(SourceFlags::ADDRESS) {
        let windows = permutations(query, flags, params.autocomplete);
        let groups: Vec<(Vec<String>, EndingType)> =
            windows.iter().map(|w| (w.tokens.clone(), w.ending_type)).collect();
        let results = lookup.fuzzy_match_multi(&groups, params.max_word_dist, params.max_phrase_dist)?;
        for (window, matches) in windows.iter().zip(results) {
            for m in matches {
                found.push(Phrasematch {
                    phrase: m.phrase.join(" "),
                    mask: window.mask,
                    weight: weight_of(window.mask),
                    edit_distance: m.edit_distance,
                    ending_type: m.ending_type,
                });
            }
        }
    } else {
        let required = required_masks(&query.owner);
        let matches = lookup.fuzzy_match_windows(
            &query.tokens,
            params.max_word_dist,
            params.max_phrase_dist,
            params.ending(true),
        )?;
        for m in matches {
            let (start, len) = (m.start_position, m.phrase.len());
            if len == 0 || start + len > query.tokens.len() {
                continue;
            }
            let span = span_mask(start, len);
            if required.iter().any(|&r| splits(span, r)) {
                continue;
            }
            let mask = original_mask(&query.owner, start, len);
            if !is_contiguous(mask) {
                continue;
            }
            found.push(Phrasematch {
                phrase: m.phrase.join(" "),
                mask,
                weight: weight_of(mask),
                edit_distance: m.edit_distance,
                ending_type: m.ending_type,
            });
        }
    }

    Ok(dedupe(found))
}

/// One phrasematch per phrase, keeping the heaviest (then the closest); first-seen order.
fn dedupe(found: Vec<Phrasematch>) -> Vec<Phrasematch> {
    let mut out: Vec<Phrasematch> = Vec::with_capacity(found.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for pm in found {
        match seen.get(&pm.phrase) {
            Some(&i) => {
                let kept = &out[i];
                if pm.weight > kept.weight || (pm.weight == kept.weight && pm.edit_distance < kept.edit_distance) {
                    out[i] = pm;
                }
            }
            None => {
                seen.insert(pm.phrase.clone(), out.len());
                out.push(pm);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplacementRule;
    use crate::fuzzy::{FuzzyMatch, FuzzyWindowMatch};
    use crate::text::{Replacer, tokenize};
    use parking_lot::Mutex;
    use std::collections::HashSet;

    type WindowsFn = dyn Fn(&[String]) -> Vec<FuzzyWindowMatch> + Send + Sync;

    /// Records dictionary calls; multi calls echo every group back as an exact hit.
    #[derive(Default)]
    struct Recorder {
        windows_calls: Mutex<Vec<(Vec<String>, u8, u8, EndingType)>>,
        multi_calls: Mutex<Vec<Vec<(Vec<String>, EndingType)>>>,
        windows_reply: Option<Box<WindowsFn>>,
    }

    impl PhraseLookup for Recorder {
        fn contains(&self, _phrase: &[String], _ending_type: EndingType) -> Result<bool> {
            Ok(false)
        }

        fn fuzzy_match(&self, _: &[String], _: u8, _: u8, _: EndingType) -> Result<Vec<FuzzyMatch>> {
            panic!("single phrase lookups are never issued by phrasematch");
        }

        fn fuzzy_match_windows(&self, tokens: &[String], w: u8, p: u8, e: EndingType) -> Result<Vec<FuzzyWindowMatch>> {
            self.windows_calls.lock().push((tokens.to_vec(), w, p, e));
            Ok(self.windows_reply.as_ref().map(|f| f(tokens)).unwrap_or_default())
        }

        fn fuzzy_match_multi(
            &self,
            groups: &[(Vec<String>, EndingType)],
            _: u8,
            _: u8,
        ) -> Result<Vec<Vec<FuzzyMatch>>> {
            self.multi_calls.lock().push(groups.to_vec());
            Ok(groups
                .iter()
                .map(|(phrase, ending_type)| {
                    vec![FuzzyMatch { phrase: phrase.clone(), edit_distance: 0, ending_type: *ending_type }]
                })
                .collect())
        }
    }

    fn strasse() -> Replacer {
        Replacer::new(&[ReplacementRule::new("([^ ]+)(strasse|str|straße)", "$1 str")]).unwrap()
    }

    fn by_phrase(pms: &[Phrasematch]) -> HashMap<String, (u32, f64)> {
        pms.iter().map(|pm| (pm.phrase.clone(), (pm.mask, pm.weight))).collect()
    }

    fn bearable(windows: &[PhraseWindow]) -> Vec<(String, u32, bool)> {
        windows.iter().map(|w| (w.tokens.join(" "), w.mask, w.ender)).collect()
    }

    fn owned(v: &[(&str, u32, bool)]) -> Vec<(String, u32, bool)> {
        v.iter().map(|(p, m, e)| (p.to_string(), *m, *e)).collect()
    }

    #[test]
    fn plain_source_issues_one_windows_call() {
        let recorder = Recorder::default();
        let query = TokenizedQuery::identity(tokenize("100 Main Street"));
        let out = phrasematch(&query, SourceFlags::empty(), &recorder, FuzzyParams::EXACT).unwrap();
        assert!(out.is_empty());
        let calls = recorder.windows_calls.lock();
        let tokens = vec!["100".to_string(), "main".into(), "street".into()];
        assert_eq!(*calls, vec![(tokens, 0, 0, EndingType::NonPrefix)]);
        assert!(recorder.multi_calls.lock().is_empty());
    }

    #[test]
    fn expanded_tokens_are_never_split() {
        let reply = |_: &[String]| -> Vec<FuzzyWindowMatch> {
            [(0, "100 herman str"), (0, "100 herman"), (1, "herman str"), (1, "herman"), (2, "str"), (0, "100")]
                .iter()
                .map(|(start, phrase)| FuzzyWindowMatch {
                    start_position: *start,
                    phrase: phrase.split(' ').map(str::to_string).collect(),
                    edit_distance: 0,
                    ending_type: EndingType::NonPrefix,
                })
                .collect()
        };
        let recorder = Recorder { windows_reply: Some(Box::new(reply)), ..Recorder::default() };
        let query = strasse().apply(tokenize("100 hermanstrasse"));

        let out = phrasematch(&query, SourceFlags::empty(), &recorder, FuzzyParams::EXACT).unwrap();
        assert_eq!(recorder.windows_calls.lock()[0].0, vec!["100", "herman", "str"]);
        assert_eq!(out.len(), 3);
        let found = by_phrase(&out);
        assert_eq!(found["100 herman str"], (3, 1.0));
        assert_eq!(found["herman str"], (2, 0.5));
        assert_eq!(found["100"], (1, 0.5));
    }

    #[test]
    fn address_permutations_in_order() {
        let recorder = Recorder::default();
        let query = TokenizedQuery::identity(tokenize("100 Main Street"));
        phrasematch(&query, SourceFlags::ADDRESS, &recorder, FuzzyParams::EXACT).unwrap();

        let calls = recorder.multi_calls.lock();
        assert_eq!(calls.len(), 1);
        assert!(recorder.windows_calls.lock().is_empty());
        let groups: Vec<(String, EndingType)> = calls[0].iter().map(|(p, e)| (p.join(" "), *e)).collect();
        assert!(groups.iter().all(|(_, e)| *e == EndingType::NonPrefix));

        let windows = permutations(&query, SourceFlags::ADDRESS, false);
        assert_eq!(
            bearable(&windows),
            owned(&[
                ("100 main street", 7, true),
                ("1## main street", 7, true),
                ("100 main", 3, false),
                ("main street", 6, true),
                ("1## main", 3, false),
                ("100", 1, false),
                ("main", 2, false),
                ("street", 4, true),
                ("1##", 1, false),
            ])
        );
        let phrases: Vec<String> = groups.iter().map(|(p, _)| p.clone()).collect();
        let expected: Vec<String> = bearable(&windows).into_iter().map(|w| w.0).collect();
        assert_eq!(phrases, expected);
    }

    #[test]
    fn address_permutations_all_numbers() {
        let query = TokenizedQuery::identity(tokenize("100 200 300"));
        let windows: HashSet<(String, u32, bool)> =
            bearable(&permutations(&query, SourceFlags::ADDRESS, false)).into_iter().collect();
        let expected: HashSet<(String, u32, bool)> = owned(&[
            ("100 200 300", 7, true),
            ("3## 100 200", 7, false),
            ("1## 200 300", 7, true),
            ("3## 200", 6, false),
            ("1## 200", 3, false),
            ("2## 300", 6, true),
            ("200 300", 6, true),
            ("100 200", 3, false),
            ("2## 100", 3, false),
            ("1##", 1, false),
            ("300", 4, true),
            ("2##", 2, false),
            ("200", 2, false),
            ("100", 1, false),
            ("3##", 4, true),
        ])
        .into_iter()
        .collect();
        assert_eq!(windows.len(), 15);
        assert_eq!(windows, expected);
    }

    #[test]
    fn address_single_term_still_uses_multi() {
        let recorder = Recorder::default();
        let query = TokenizedQuery::identity(tokenize("baltimore"));
        let out = phrasematch(&query, SourceFlags::ADDRESS, &recorder, FuzzyParams::EXACT).unwrap();
        assert_eq!(recorder.multi_calls.lock().len(), 1);
        assert_eq!(by_phrase(&out), HashMap::from([("baltimore".to_string(), (1, 1.0))]));
    }

    #[test]
    fn address_basic_masks() {
        let recorder = Recorder::default();
        let query = TokenizedQuery::identity(tokenize("100 main"));
        let out = phrasematch(&query, SourceFlags::ADDRESS, &recorder, FuzzyParams::EXACT).unwrap();
        let groups: Vec<String> = recorder.multi_calls.lock()[0].iter().map(|(p, _)| p.join(" ")).collect();
        assert_eq!(groups, vec!["100 main", "1## main", "100", "main", "1##"]);
        assert_eq!(
            by_phrase(&out),
            HashMap::from([
                ("1##".to_string(), (1, 0.5)),
                ("100".to_string(), (1, 0.5)),
                ("main".to_string(), (2, 0.5)),
                ("100 main".to_string(), (3, 1.0)),
                ("1## main".to_string(), (3, 1.0)),
            ])
        );
    }

    #[test]
    fn address_masks_for_expanded_terms() {
        let recorder = Recorder::default();
        let query = strasse().apply(tokenize("hermanstrasse 100"));
        let out = phrasematch(&query, SourceFlags::ADDRESS, &recorder, FuzzyParams::EXACT).unwrap();
        let groups: Vec<String> = recorder.multi_calls.lock()[0].iter().map(|(p, _)| p.join(" ")).collect();
        assert_eq!(groups, vec!["herman str 100", "1## herman str", "herman str", "100", "1##"]);
        assert_eq!(
            by_phrase(&out),
            HashMap::from([
                ("herman str 100".to_string(), (3, 1.0)),
                ("1## herman str".to_string(), (3, 1.0)),
                ("herman str".to_string(), (1, 0.5)),
                ("100".to_string(), (2, 0.5)),
                ("1##".to_string(), (2, 0.5)),
            ])
        );
    }

    #[test]
    fn autocomplete_only_prefixes_enders() {
        let query = TokenizedQuery::identity(tokenize("100 main"));
        let windows = permutations(&query, SourceFlags::ADDRESS, true);
        for w in &windows {
            let expected = if w.ender { EndingType::AnyPrefix } else { EndingType::NonPrefix };
            assert_eq!(w.ending_type, expected, "{:?}", w.tokens);
        }
    }

    #[test]
    fn empty_query_skips_the_dictionary() {
        let recorder = Recorder::default();
        let query = TokenizedQuery::identity(Vec::new());
        assert!(phrasematch(&query, SourceFlags::ADDRESS, &recorder, FuzzyParams::EXACT).unwrap().is_empty());
        assert!(phrasematch(&query, SourceFlags::empty(), &recorder, FuzzyParams::EXACT).unwrap().is_empty());
        assert!(recorder.multi_calls.lock().is_empty());
        assert!(recorder.windows_calls.lock().is_empty());
    }

    #[test]
    fn dedupe_keeps_the_heaviest() {
        let pm = |phrase: &str, mask: u32, weight: f64| Phrasematch {
            phrase: phrase.to_string(),
            mask,
            weight,
            edit_distance: 0,
            ending_type: EndingType::NonPrefix,
        };
        let out = dedupe(vec![pm("main", 2, 0.25), pm("street", 4, 0.25), pm("main", 6, 0.5)]);
        assert_eq!(out, vec![pm("main", 6, 0.5), pm("street", 4, 0.25)]);
    }
}

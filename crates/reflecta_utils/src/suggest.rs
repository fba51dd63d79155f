/// Picks the candidate closest to `target` by edit distance, if any is close
/// enough to be a plausible typo.
///
/// Comparison is case-insensitive; an exact case-insensitive match always
/// wins since it usually means the caller forgot an ignore-case flag.
pub fn find_best_match<I, S>(target: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let threshold = if target.chars().count() < 3 { 1 } else { 3 };
    let lowered = target.to_lowercase();

    let mut best: Option<(usize, String)> = None;
    for candidate in candidates {
        let candidate = candidate.as_ref();
        if candidate == target {
            continue;
        }
        let distance = levenshtein_distance(&lowered, &candidate.to_lowercase());
        if distance > threshold {
            continue;
        }
        if best.as_ref().is_none_or(|(current, _)| distance < *current) {
            best = Some((distance, candidate.to_string()));
        }
    }

    best.map(|(_, candidate)| candidate)
}

/// Edit distance between two strings, counted in chars.
pub fn levenshtein_distance(left: &str, right: &str) -> usize {
    let right: Vec<char> = right.chars().collect();
    let mut previous: Vec<usize> = (0..=right.len()).collect();
    let mut current = vec![0; right.len() + 1];

    for (i, lc) in left.chars().enumerate() {
        current[0] = i + 1;
        for (j, rc) in right.iter().enumerate() {
            let substitution = previous[j] + usize::from(lc != *rc);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[right.len()]
}

use std::collections::HashSet;

/// Trigram similarity in the style of PostgreSQL's `pg_trgm`.
///
/// Each alphanumeric word is lowercased and padded with two leading blanks and one trailing
/// blank; the score is shared trigrams over the union of both sets.
pub fn trigram_similarity(left: &str, right: &str) -> f32 {
    let left = trigrams(left);
    let right = trigrams(right);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let shared = left.intersection(&right).count();
    let union = left.len() + right.len() - shared;
    shared as f32 / union as f32
}

fn trigrams(value: &str) -> HashSet<[char; 3]> {
    let mut set = HashSet::new();
    for word in value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
    {
        let padded: Vec<char> = "  "
            .chars()
            .chain(word.chars().flat_map(char::to_lowercase))
            .chain(std::iter::once(' '))
            .collect();
        for window in padded.windows(3) {
            set.insert([window[0], window[1], window[2]]);
        }
    }
    set
}

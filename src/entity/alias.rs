/// Names an entity is cached under, starting with `name` itself.
///
/// Marker sets are named `Sub<digits>` in Motive while skeletons are addressed
/// as `Skeleton_<id>`; a `Sub` name therefore also answers to the skeleton
/// form with leading zeros stripped (`Sub001` -> `Skeleton_1`).
pub fn derive_aliases(name: &str) -> Vec<String> {
    let mut aliases = vec![name.to_string()];

    if let Some(number) = subject_number(name) {
        let alias = skeleton_alias(number);
        if alias != name {
            aliases.push(alias);
        }
    }

    aliases
}

/// `Skeleton_<id>` key used for skeleton ids
pub fn skeleton_alias(id: impl std::fmt::Display) -> String {
    format!("Skeleton_{}", id)
}

fn subject_number(name: &str) -> Option<u64> {
    let digits = name.strip_prefix("Sub")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

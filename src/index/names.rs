//! Unique, deterministic file names for the messages of one directory.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::warn;

use crate::index::object::ObjectIndex;
use crate::model::mail::MailMetadata;
use crate::model::{truncate_name, NAME_MAX};

/// Bytes kept free after a base name for two `-N` suffixes of up to ten
/// digits each.
const SUFFIX_ROOM: usize = 2 * (1 + 10);

/// Resolve the uids destined for one directory into `(file name, metadata)`
/// pairs, oldest message first.
///
/// The base name is `<sender>-<subject slug>`. A base name shared by several
/// messages gets `-0`, `-1`, … appended in timestamp order; a base name used
/// once is kept as is. Should a suffixed name still clash with another base
/// name, further `-N` suffixes are tried until it is free. Uids unknown to the
/// index are ignored.
///
/// Base names are cut to `NAME_MAX - SUFFIX_ROOM` bytes before grouping, so
/// every returned name fits in [`NAME_MAX`] bytes and two long subjects that
/// share a prefix are told apart by their suffixes.
pub fn resolve_names(uids: &[u32], index: &ObjectIndex) -> Vec<(String, Arc<MailMetadata>)> {
    let mut metas: Vec<&Arc<MailMetadata>> = uids
        .iter()
        .filter_map(|uid| {
            let meta = index.get(*uid);
            if meta.is_none() {
                warn!(uid, "Uid missing from object index");
            }
            meta
        })
        .collect();
    // Stable: equal timestamps keep their input order.
    metas.sort_by_key(|meta| meta.timestamp);

    let candidates: Vec<String> = metas
        .iter()
        .map(|meta| {
            let base = format!("{}-{}", meta.sender, meta.subject_slug);
            truncate_name(&base, NAME_MAX - SUFFIX_ROOM).to_string()
        })
        .collect();

    let mut group_sizes: HashMap<&str, usize> = HashMap::new();
    for name in &candidates {
        *group_sizes.entry(name.as_str()).or_default() += 1;
    }

    let mut next_index: HashMap<&str, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::with_capacity(candidates.len());
    let mut resolved = Vec::with_capacity(candidates.len());

    for (candidate, meta) in candidates.iter().zip(metas) {
        let name = if group_sizes[candidate.as_str()] > 1 {
            let idx = next_index.entry(candidate.as_str()).or_default();
            let name = format!("{candidate}-{idx}");
            *idx += 1;
            name
        } else {
            candidate.clone()
        };

        let name = unclaimed(name, &taken);
        taken.insert(name.clone());
        resolved.push((name, Arc::clone(meta)));
    }

    resolved
}

/// Return `name`, or the first `name-N` (N = 1, 2, …) not in `taken`.
fn unclaimed(name: String, taken: &HashSet<String>) -> String {
    if !taken.contains(&name) {
        return name;
    }
    let mut n = 1;
    loop {
        let alt = format!("{name}-{n}");
        if !taken.contains(&alt) {
            return alt;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(uid: u32, sender: &str, slug: &str, timestamp: i64) -> MailMetadata {
        MailMetadata {
            uid,
            sender: sender.to_string(),
            subject_slug: slug.to_string(),
            year: 2023,
            month: 5,
            day: 10,
            timestamp,
            content: Vec::new(),
        }
    }

    fn names(index: &ObjectIndex, uids: &[u32]) -> Vec<(String, u32)> {
        resolve_names(uids, index)
            .into_iter()
            .map(|(name, meta)| (name, meta.uid))
            .collect()
    }

    #[test]
    fn test_duplicates_get_index_in_timestamp_order() {
        let index = ObjectIndex::build(vec![
            meta(1, "alice@example.com", "hello", 200),
            meta(2, "alice@example.com", "hello", 100),
            meta(3, "bob@example.com", "report", 150),
        ]);
        assert_eq!(
            names(&index, &[1, 2, 3]),
            vec![
                ("alice@example.com-hello-0".to_string(), 2),
                ("bob@example.com-report".to_string(), 3),
                ("alice@example.com-hello-1".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let index = ObjectIndex::build(vec![
            meta(7, "a@x", "same", 5),
            meta(4, "a@x", "same", 5),
        ]);
        assert_eq!(
            names(&index, &[7, 4]),
            vec![("a@x-same-0".to_string(), 7), ("a@x-same-1".to_string(), 4)]
        );
    }

    #[test]
    fn test_suffix_clash_with_literal_name() {
        // "hello-0" as a real slug collides with the suffixed duplicate.
        let index = ObjectIndex::build(vec![
            meta(1, "a@x", "hello-0", 1),
            meta(2, "a@x", "hello", 2),
            meta(3, "a@x", "hello", 3),
        ]);
        let resolved = names(&index, &[1, 2, 3]);
        let unique: HashSet<&str> = resolved.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(unique.len(), 3);
        assert_eq!(resolved[0].0, "a@x-hello-0");
        assert_eq!(resolved[1].0, "a@x-hello-0-1");
        assert_eq!(resolved[2].0, "a@x-hello-1");
    }

    #[test]
    fn test_deterministic() {
        let build = || {
            ObjectIndex::build((0..20).map(|i| meta(i, "a@x", ["x", "y"][i as usize % 2], 10)))
        };
        let uids: Vec<u32> = (0..20).collect();
        assert_eq!(names(&build(), &uids), names(&build(), &uids));
    }

    #[test]
    fn test_long_subjects_fit_and_stay_unique() {
        let long = |tail: &str| format!("{}{tail}", "lorem-ipsum-".repeat(80));
        let index = ObjectIndex::build(vec![
            meta(1, "a@x", &long("alpha"), 1),
            meta(2, "a@x", &long("alpha"), 2),
            meta(3, "a@x", &long("beta"), 3),
            meta(4, "a@x", "short", 4),
        ]);
        let resolved = names(&index, &[1, 2, 3, 4]);
        assert!(resolved.iter().all(|(name, _)| name.len() <= NAME_MAX));

        let unique: HashSet<&str> = resolved.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(unique.len(), 4);

        // The three long subjects collapse onto one base and are numbered.
        let full = format!("a@x-{}", long("alpha"));
        let base = truncate_name(&full, NAME_MAX - SUFFIX_ROOM);
        assert_eq!(resolved[0].0, format!("{base}-0"));
        assert_eq!(resolved[1].0, format!("{base}-1"));
        assert_eq!(resolved[2].0, format!("{base}-2"));
        assert_eq!(resolved[3].0, "a@x-short");
    }

    #[test]
    fn test_unknown_uid_ignored() {
        let index = ObjectIndex::build(vec![meta(1, "a@x", "s", 1)]);
        assert_eq!(names(&index, &[1, 99]).len(), 1);
    }
}

// ── Identifier allocation ──
//
// OS object names are length-limited (IFNAMSIZ is 16 including NUL), so
// user-chosen long ids never appear in them. Each long id gets a short
// sequential code, and every OS-visible name is `<state_id><short_id>` --
// which also keeps independent topologies from colliding on one host.

use tracing::error;

use crate::model::{IdentityRecord, NetworkType, StateDocument};

/// Longest OS-visible object name (interface/bridge/namespace).
pub const MAX_OS_NAME: usize = 15;

/// The short code for `long_id`, allocating the next sequential code on
/// first sight. Codes are issued by map size, so collisions are
/// structurally impossible; the bump loop recovers from a corrupted map.
pub fn short_id(doc: &mut StateDocument, long_id: &str) -> String {
    if let Some(existing) = doc.netns.get(long_id) {
        return existing.clone();
    }

    let mut id_num = doc.identifiers.len();
    let mut key = format!("{id_num:03}");
    while doc.identifiers.contains_key(&key) {
        error!("short identifier collision on {key}, attempting to fix");
        id_num += 1;
        key = format!("{id_num:03}");
    }

    doc.identifiers.insert(
        key.clone(),
        IdentityRecord {
            id: long_id.to_owned(),
        },
    );
    doc.netns.insert(long_id.to_owned(), key.clone());
    key
}

/// The short code for `long_id` if one was ever allocated.
pub fn lookup_short_id<'a>(doc: &'a StateDocument, long_id: &str) -> Option<&'a str> {
    doc.netns.get(long_id).map(String::as_str)
}

/// The OS-visible name prefix for `long_id`: state id + short code.
pub fn unique_prefix(state_id: &str, doc: &mut StateDocument, long_id: &str) -> String {
    format!("{state_id}{}", short_id(doc, long_id))
}

/// Drop both directions of the mapping for `long_id`.
pub fn remove_identifier(doc: &mut StateDocument, long_id: &str) {
    if let Some(short) = doc.netns.remove(long_id) {
        doc.identifiers.remove(&short);
    }
}

/// Smallest usable number for a new link of `link_type`.
///
/// Existing numbers are sorted; a non-zero minimum is extended downward
/// first, then the first gap is reused, then the sequence grows past the
/// maximum. Reuse keeps generated names compact after deletions.
pub fn next_link_number(doc: &StateDocument, link_type: NetworkType) -> u32 {
    let mut numbers: Vec<u32> = doc
        .link
        .values()
        .filter(|link| link.link_type == link_type)
        .map(|link| link.number)
        .collect();

    if numbers.is_empty() {
        return 0;
    }
    numbers.sort_unstable();

    if numbers[0] > 0 {
        return numbers[0] - 1;
    }
    for pair in numbers.windows(2) {
        if pair[1] - pair[0] > 1 {
            return pair[0] + 1;
        }
    }
    numbers.last().copied().unwrap_or(0) + 1
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::Link;

    fn link(link_type: NetworkType, number: u32) -> Link {
        Link {
            link_type,
            number,
            node: None,
            network: None,
            node_end: String::new(),
            network_end: String::new(),
            tap: false,
            fix_hw_addr: None,
        }
    }

    #[test]
    fn short_ids_are_sequential_zero_padded() {
        let mut doc = StateDocument::default();
        assert_eq!(short_id(&mut doc, "a"), "000");
        assert_eq!(short_id(&mut doc, "b"), "001");
        assert_eq!(short_id(&mut doc, "c"), "002");
        // Idempotent for an already-registered id.
        assert_eq!(short_id(&mut doc, "a"), "000");
        assert_eq!(doc.identifiers.get("001").map(|r| r.id.as_str()), Some("b"));
    }

    #[test]
    fn short_ids_survive_serialization() {
        let mut doc = StateDocument::default();
        short_id(&mut doc, "a");
        short_id(&mut doc, "b");

        let json = serde_json::to_string(&doc).expect("serialize");
        let mut reloaded: StateDocument = serde_json::from_str(&json).expect("parse");
        assert_eq!(short_id(&mut reloaded, "b"), "001");
        assert_eq!(short_id(&mut reloaded, "c"), "002");
    }

    #[test]
    fn collision_bumps_forward() {
        let mut doc = StateDocument::default();
        // Corrupt map: the code the map size points at is already taken.
        doc.identifiers
            .insert("001".into(), IdentityRecord { id: "ghost".into() });
        assert_eq!(short_id(&mut doc, "a"), "002");
    }

    #[test]
    fn unique_prefix_carries_state_id() {
        let mut doc = StateDocument::default();
        assert_eq!(unique_prefix("net", &mut doc, "node01"), "net000");
    }

    #[test]
    fn remove_identifier_clears_both_maps() {
        let mut doc = StateDocument::default();
        short_id(&mut doc, "a");
        remove_identifier(&mut doc, "a");
        assert!(doc.identifiers.is_empty());
        assert!(doc.netns.is_empty());
    }

    #[test]
    fn link_numbers_reuse_gaps() {
        let mut doc = StateDocument::default();
        assert_eq!(next_link_number(&doc, NetworkType::Thread), 0);

        for number in [0, 1, 3] {
            doc.link
                .insert(format!("thread{number}"), link(NetworkType::Thread, number));
        }
        assert_eq!(next_link_number(&doc, NetworkType::Thread), 2);

        let mut doc = StateDocument::default();
        for number in [1, 2, 3] {
            doc.link
                .insert(format!("wifi{number}"), link(NetworkType::Wifi, number));
        }
        assert_eq!(next_link_number(&doc, NetworkType::Wifi), 0);

        // Other types do not interfere.
        assert_eq!(next_link_number(&doc, NetworkType::Thread), 0);
    }
}

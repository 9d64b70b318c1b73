use super::{citation::Citation, ApparatusEntry};

/// Trim, then drop one trailing punctuation mark.
fn comparable(text: &str) -> &str {
    let text = text.trim();
    text.strip_suffix([',', '.', ':', ';', '?', '!'])
        .unwrap_or(text)
        .trim_end()
}

fn same_text(a: &str, b: &str) -> bool {
    comparable(a) == comparable(b)
}

fn join_citations(into: &mut Citation, from: &Citation) -> bool {
    match (into, from) {
        (Citation::Witnesses { refs, note }, Citation::Witnesses { refs: more, note: more_note }) => {
            for r in more {
                if !refs.iter().any(|existing| existing.siglum == r.siglum) {
                    refs.push(r.clone());
                }
            }
            if note.is_none() {
                *note = more_note.clone();
            }
            true
        }
        _ => false,
    }
}

fn group_key(entry: &ApparatusEntry) -> String {
    entry
        .readings
        .first()
        .map(|r| r.witnesses.wit_attribute())
        .unwrap_or_default()
}

/// Merge apparatus entries that were recorded once per witness group.
///
/// Entries are grouped by the witnesses of their first reading. The first group is the base;
/// an entry of a later group with the same ordinal and lemma text is folded into the base entry:
/// a reading with the same text gains the extra witnesses, any other reading is appended.
/// Unmatched entries are appended after the base group. Texts are compared ignoring surrounding
/// whitespace and one trailing punctuation mark.
pub fn merge_witness_groups(entries: Vec<ApparatusEntry>) -> Vec<ApparatusEntry> {
    let mut groups: Vec<(String, Vec<ApparatusEntry>)> = vec![];
    for entry in entries {
        let key = group_key(&entry);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => group.push(entry),
            None => groups.push((key, vec![entry])),
        }
    }

    let mut groups = groups.into_iter().map(|(_, group)| group);
    let Some(mut merged) = groups.next() else {
        return vec![];
    };

    for group in groups {
        let mut unmatched = vec![];
        for candidate in group {
            let Some(target) = merged.iter_mut().find(|e| {
                e.ordinal == candidate.ordinal && same_text(&e.lemma.text, &candidate.lemma.text)
            }) else {
                unmatched.push(candidate);
                continue;
            };
            for reading in candidate.readings {
                let joined = target
                    .readings
                    .iter_mut()
                    .find(|r| same_text(&r.text, &reading.text))
                    .is_some_and(|r| join_citations(&mut r.witnesses, &reading.witnesses));
                if !joined {
                    target.readings.push(reading);
                }
            }
        }
        merged.extend(unmatched);
    }
    tracing::debug!("Merged witness groups into {} entries", merged.len());
    merged
}

use crate::model::*;

// ── Free-window algorithm ─────────────────────────────────────────

/// Nights inside `window` not covered by any of `restrictions`, as disjoint
/// sorted stays. Used by the admin calendar; booking decisions use
/// `RoomState::is_free`.
pub fn free_windows(window: &Stay, restrictions: &[RoomRestriction]) -> Vec<Stay> {
    let mut occupied: Vec<Stay> = restrictions
        .iter()
        .filter(|r| r.stay.overlaps(window))
        .map(|r| Stay {
            start: r.stay.start.max(window.start),
            end: r.stay.end.min(window.end),
        })
        .collect();
    occupied.sort_by_key(|s| s.start);
    let occupied = merge_overlapping(&occupied);
    subtract_stays(&[*window], &occupied)
}

/// Merge sorted overlapping or touching stays into disjoint stays.
fn merge_overlapping(sorted: &[Stay]) -> Vec<Stay> {
    let mut merged: Vec<Stay> = Vec::new();
    for &stay in sorted {
        if let Some(last) = merged.last_mut()
            && stay.start <= last.end
        {
            last.end = last.end.max(stay.end);
            continue;
        }
        merged.push(stay);
    }
    merged
}

/// `base` minus `to_remove`; both sorted and disjoint.
fn subtract_stays(base: &[Stay], to_remove: &[Stay]) -> Vec<Stay> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < b.end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Stay {
                    start: current_start,
                    end: r.start,
                });
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < b.end {
            result.push(Stay {
                start: current_start,
                end: b.end,
            });
        }
    }

    result
}

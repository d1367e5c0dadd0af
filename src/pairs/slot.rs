//! Admission into a single cell's fixed region of `k` slots.

use super::{AdmissionPolicy, CellInfo, Pair};

/// Offer `pair` to a region. Returns true if it was stored.
#[inline]
pub(super) fn admit(
    region: &mut [Pair],
    info: &mut CellInfo,
    policy: AdmissionPolicy,
    pair: Pair,
) -> bool {
    match policy {
        AdmissionPolicy::LinearScan => admit_linear(region, info, pair),
        AdmissionPolicy::Heap => admit_heap(region, info, pair),
    }
}

fn admit_linear(region: &mut [Pair], info: &mut CellInfo, pair: Pair) -> bool {
    let k = region.len();
    let used = info.used_count as usize;

    // Full and not better than the current minimum: nothing to do.
    if used == k && pair.similarity <= info.lowest_similarity {
        return false;
    }
    if region[..used].iter().any(|p| p.cell_id == pair.cell_id) {
        return false;
    }

    if used < k {
        region[used] = pair;
        if used == 0 || pair.similarity < info.lowest_similarity {
            info.lowest_similarity = pair.similarity;
            info.lowest_similarity_index = used as u32;
        }
        info.used_count += 1;
        return true;
    }

    region[info.lowest_similarity_index as usize] = pair;
    let (index, lowest) = region
        .iter()
        .enumerate()
        .fold((0, f32::INFINITY), |(bi, bs), (i, p)| {
            if p.similarity < bs {
                (i, p.similarity)
            } else {
                (bi, bs)
            }
        });
    info.lowest_similarity_index = index as u32;
    info.lowest_similarity = lowest;
    true
}

fn admit_heap(region: &mut [Pair], info: &mut CellInfo, pair: Pair) -> bool {
    let k = region.len();
    let used = info.used_count as usize;

    if used < k {
        region[used] = pair;
        sift_up(region, used);
        info.used_count += 1;
    } else if pair.similarity > region[0].similarity {
        region[0] = pair;
        sift_down(region, 0);
    } else {
        return false;
    }

    // The root of a min-heap is the minimum.
    info.lowest_similarity_index = 0;
    info.lowest_similarity = region[0].similarity;
    true
}

fn sift_up(heap: &mut [Pair], mut i: usize) {
    while i > 0 {
        let parent = (i - 1) / 2;
        if heap[i].similarity < heap[parent].similarity {
            heap.swap(i, parent);
            i = parent;
        } else {
            break;
        }
    }
}

fn sift_down(heap: &mut [Pair], mut i: usize) {
    let n = heap.len();
    loop {
        let left = 2 * i + 1;
        let right = left + 1;
        let mut smallest = i;
        if left < n && heap[left].similarity < heap[smallest].similarity {
            smallest = left;
        }
        if right < n && heap[right].similarity < heap[smallest].similarity {
            smallest = right;
        }
        if smallest == i {
            break;
        }
        heap.swap(i, smallest);
        i = smallest;
    }
}

/// Order a region's valid entries by decreasing similarity, ties by partner.
pub(super) fn sort_region(region: &mut [Pair], info: &mut CellInfo) {
    let used = info.used_count as usize;
    region[..used].sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then(a.cell_id.cmp(&b.cell_id))
    });
    if used > 0 {
        info.lowest_similarity_index = (used - 1) as u32;
        info.lowest_similarity = region[used - 1].similarity;
    }
}

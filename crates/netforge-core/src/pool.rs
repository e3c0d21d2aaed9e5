// ── ISP address pool ──
//
// A fixed 255-slot pool simulating shared uplink addressing. Slot 0 is the
// uplink bridge itself; slots 1..254 are handed to nodes. All accounting
// runs under the `isp` lock -- the last-consumer teardown policy depends
// on acquire/release being strictly serialized.

use crate::model::IspSlot;

/// Total slots, including the reserved uplink slot.
pub const POOL_SIZE: usize = 255;

/// Slots free when only the reserved uplink slot remains occupied.
pub const TEARDOWN_FREE_COUNT: usize = POOL_SIZE - 1;

/// Build a fresh pool for `isp_id` on `prefix` (e.g. `172.16.7.`), all
/// slots unoccupied. `isp_index` is 1-based; the address of slot i is
/// `<prefix><i+1>`.
pub fn build_pool(prefix: &str, isp_id: &str) -> Vec<IspSlot> {
    (1..=POOL_SIZE)
        .map(|index| IspSlot {
            isp_addr: format!("{prefix}{index}"),
            isp_index: u32::try_from(index).unwrap_or(0),
            occupy: false,
            isp_host_end: format!("{isp_id}{index}_host"),
            isp_node_end: format!("{isp_id}{index}_node"),
        })
        .collect()
}

/// Array index of the first unoccupied slot.
pub fn first_available(pool: &[IspSlot]) -> Option<usize> {
    pool.iter().position(|slot| !slot.occupy)
}

pub fn available_count(pool: &[IspSlot]) -> usize {
    pool.iter().filter(|slot| !slot.occupy).count()
}

pub fn set_occupancy(pool: &mut [IspSlot], index: usize, value: bool) {
    if let Some(slot) = pool.get_mut(index) {
        slot.occupy = value;
    }
}

/// Whether the shared uplink may be torn down: everything released except
/// the reserved slot.
pub fn teardown_eligible(pool: &[IspSlot]) -> bool {
    available_count(pool) == TEARDOWN_FREE_COUNT
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn fresh_pool_shape() {
        let pool = build_pool("172.16.9.", "eth");
        assert_eq!(pool.len(), POOL_SIZE);
        assert_eq!(pool[0].isp_addr, "172.16.9.1");
        assert_eq!(pool[0].isp_index, 1);
        assert_eq!(pool[254].isp_addr, "172.16.9.255");
        assert_eq!(pool[3].isp_host_end, "eth4_host");
        assert_eq!(available_count(&pool), POOL_SIZE);
    }

    #[test]
    fn exhaust_release_one_exactly_one_available() {
        let mut pool = build_pool("172.16.9.", "eth");
        set_occupancy(&mut pool, 0, true); // uplink

        // Acquire all 254 assignable slots.
        while let Some(index) = first_available(&pool) {
            set_occupancy(&mut pool, index, true);
        }
        assert_eq!(available_count(&pool), 0);
        assert!(!teardown_eligible(&pool));

        set_occupancy(&mut pool, 17, false);
        assert_eq!(available_count(&pool), 1);
        assert_eq!(first_available(&pool), Some(17));
    }

    #[test]
    fn releasing_all_makes_teardown_eligible() {
        let mut pool = build_pool("172.16.9.", "eth");
        set_occupancy(&mut pool, 0, true);
        for index in 1..POOL_SIZE {
            set_occupancy(&mut pool, index, true);
        }

        for index in 1..POOL_SIZE {
            assert!(!teardown_eligible(&pool));
            set_occupancy(&mut pool, index, false);
        }
        assert!(teardown_eligible(&pool));
    }
}

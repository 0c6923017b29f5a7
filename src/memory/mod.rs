//! # Memory
//!
//! - `heap`: the first-fit arena allocator backing task stacks and every
//!   `alloc` collection in the kernel
//! - [`MemoryReport`]: read-only summary of the bootloader's memory map

use bootloader_api::info::{MemoryRegion, MemoryRegionKind};

pub mod heap;

pub use heap::{AllocError, Heap, HeapStats, LockedHeap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryReport {
    pub usable: u64,
    pub reserved: u64,
    pub regions: usize,
    pub largest_usable: u64,
}

impl MemoryReport {
    pub fn from_regions(regions: &[MemoryRegion]) -> Self {
        let mut report = MemoryReport {
            regions: regions.len(),
            ..MemoryReport::default()
        };
        for region in regions {
            let size = region.end.saturating_sub(region.start);
            match region.kind {
                MemoryRegionKind::Usable => {
                    report.usable += size;
                    report.largest_usable = report.largest_usable.max(size);
                }
                _ => report.reserved += size,
            }
        }
        report
    }
}

/// Short label for a region kind, as printed in the boot log.
pub fn kind_label(kind: MemoryRegionKind) -> &'static str {
    match kind {
        MemoryRegionKind::Usable => "Usable",
        MemoryRegionKind::Bootloader => "Bootloader",
        MemoryRegionKind::UnknownBios(_) => "BIOS",
        MemoryRegionKind::UnknownUefi(_) => "UEFI",
        _ => "Reserved",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(start: u64, end: u64, kind: MemoryRegionKind) -> MemoryRegion {
        MemoryRegion { start, end, kind }
    }

    #[test]
    fn report_splits_usable_and_reserved() {
        let map = [
            region(0, 0x9_f000, MemoryRegionKind::Usable),
            region(0x9_f000, 0x10_0000, MemoryRegionKind::UnknownBios(2)),
            region(0x10_0000, 0x80_0000, MemoryRegionKind::Bootloader),
            region(0x80_0000, 0x800_0000, MemoryRegionKind::Usable),
        ];
        let report = MemoryReport::from_regions(&map);
        assert_eq!(report.regions, 4);
        assert_eq!(report.usable, 0x9_f000 + 0x780_0000);
        assert_eq!(report.reserved, 0x6_1000 + 0x70_0000);
        assert_eq!(report.largest_usable, 0x780_0000);
        assert_eq!(kind_label(map[1].kind), "BIOS");
    }
}

//! First-fit heap over one fixed arena.
//!
//! Every block starts with a [`BlockHeader`]; headers form a singly linked
//! list in address order that tiles the whole arena:
//!
//! ```text
//! arena start                                              arena end
//! ┌─────┬──────────┬─────┬──────────────┬─────┬────────────────────┐
//! │ hdr │ used     │ hdr │ free         │ hdr │ used               │
//! └─────┴──────────┴─────┴──────────────┴─────┴────────────────────┘
//!    └──── next ─────▲ └───── next ──────▲
//! ```
//!
//! `allocate` takes the first free block that fits and splits off the tail
//! when it is worth keeping. `free` marks the block unused and merges it
//! with every free neighbour, so no two adjacent blocks are ever both free.

use core::alloc::{GlobalAlloc, Layout};
use core::fmt;
use core::mem;
use core::ptr::{self, NonNull};

use spin::Mutex;

use crate::cpu::{Cpu, InterruptControl};

#[repr(C)]
struct BlockHeader {
    size: usize,
    used: bool,
    next: Option<NonNull<BlockHeader>>,
}

pub const HEADER_SIZE: usize = mem::size_of::<BlockHeader>();

/// Requests are rounded up to this; it keeps every header aligned.
pub const BLOCK_ALIGN: usize = mem::align_of::<BlockHeader>();

/// A split remainder smaller than this is left attached to the allocation.
const MIN_BLOCK: usize = 16;

#[inline]
const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    OutOfMemory,
    InvalidSize,
    Uninitialized,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::OutOfMemory => write!(f, "out of memory"),
            AllocError::InvalidSize => write!(f, "invalid allocation size"),
            AllocError::Uninitialized => write!(f, "heap not initialized"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    pub arena: usize,
    pub used: usize,
    pub free: usize,
    pub blocks: usize,
    pub free_blocks: usize,
    pub largest_free: usize,
}

/// One block as seen by [`Heap::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Payload address.
    pub addr: usize,
    pub size: usize,
    pub used: bool,
}

pub struct Heap {
    head: Option<NonNull<BlockHeader>>,
    arena: usize,
}

// Safety: the arena is owned exclusively by this heap.
unsafe impl Send for Heap {}

impl Heap {
    pub const fn empty() -> Self {
        Self { head: None, arena: 0 }
    }

    /// Turns `[start, start + size)` into a single free block.
    ///
    /// # Safety
    /// - The region must be valid, writable and unused by anything else
    /// - Must only be called once
    pub unsafe fn init(&mut self, start: usize, size: usize) -> Result<(), AllocError> {
        if self.head.is_some() {
            return Err(AllocError::InvalidSize);
        }
        let aligned = align_up(start, BLOCK_ALIGN);
        let size = size.saturating_sub(aligned - start) & !(BLOCK_ALIGN - 1);
        if aligned == 0 || size < HEADER_SIZE + MIN_BLOCK {
            return Err(AllocError::InvalidSize);
        }

        let header = aligned as *mut BlockHeader;
        header.write(BlockHeader {
            size: size - HEADER_SIZE,
            used: false,
            next: None,
        });
        self.head = NonNull::new(header);
        self.arena = size;
        Ok(())
    }

    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        if self.head.is_none() {
            return Err(AllocError::Uninitialized);
        }
        if size == 0 || size > self.arena {
            return Err(if size == 0 {
                AllocError::InvalidSize
            } else {
                AllocError::OutOfMemory
            });
        }
        let wanted = align_up(size, BLOCK_ALIGN);

        let mut current = self.head;
        while let Some(node) = current {
            let addr = node.as_ptr() as usize;
            // Safety: every link in the list points at a header we wrote.
            let block = unsafe { &mut *node.as_ptr() };
            if !block.used && block.size >= wanted {
                let remainder = block.size - wanted;
                if remainder > HEADER_SIZE + MIN_BLOCK {
                    let split = (addr + HEADER_SIZE + wanted) as *mut BlockHeader;
                    unsafe {
                        split.write(BlockHeader {
                            size: remainder - HEADER_SIZE,
                            used: false,
                            next: block.next,
                        });
                    }
                    block.size = wanted;
                    block.next = NonNull::new(split);
                }
                block.used = true;
                let payload = addr + HEADER_SIZE;
                // Safety: payload is inside the arena, never zero.
                return Ok(unsafe { NonNull::new_unchecked(payload as *mut u8) });
            }
            current = block.next;
        }

        Err(AllocError::OutOfMemory)
    }

    /// Releases a block and merges it with its free neighbours.
    ///
    /// # Safety
    /// `ptr` must come from [`Heap::allocate`] on this heap and must not
    /// have been freed since.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) {
        let target = (ptr.as_ptr() as usize - HEADER_SIZE) as *mut BlockHeader;

        let mut prev: Option<NonNull<BlockHeader>> = None;
        let mut current = self.head;
        while let Some(node) = current {
            if node.as_ptr() == target {
                break;
            }
            prev = Some(node);
            current = (*node.as_ptr()).next;
        }
        let Some(node) = current else {
            debug_assert!(false, "free of a pointer outside the heap");
            return;
        };

        debug_assert!((*node.as_ptr()).used, "double free");
        (*node.as_ptr()).used = false;
        Self::coalesce_forward(node);

        if let Some(prev) = prev {
            if !(*prev.as_ptr()).used {
                Self::coalesce_forward(prev);
            }
        }
    }

    /// Absorbs every directly following free block into `node`.
    unsafe fn coalesce_forward(node: NonNull<BlockHeader>) {
        let block = &mut *node.as_ptr();
        while let Some(next) = block.next {
            let next = &*next.as_ptr();
            if next.used {
                break;
            }
            block.size += HEADER_SIZE + next.size;
            block.next = next.next;
        }
    }

    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            current: self.head,
            _heap: self,
        }
    }

    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            arena: self.arena,
            ..HeapStats::default()
        };
        for block in self.blocks() {
            stats.blocks += 1;
            if block.used {
                stats.used += block.size;
            } else {
                stats.free += block.size;
                stats.free_blocks += 1;
                stats.largest_free = stats.largest_free.max(block.size);
            }
        }
        stats
    }
}

pub struct Blocks<'a> {
    current: Option<NonNull<BlockHeader>>,
    _heap: &'a Heap,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let node = self.current?;
        // Safety: the borrow of the heap keeps the list stable.
        let block = unsafe { node.as_ref() };
        self.current = block.next;
        Some(BlockInfo {
            addr: node.as_ptr() as usize + HEADER_SIZE,
            size: block.size,
            used: block.used,
        })
    }
}

/// The heap behind a spin lock, usable as the `#[global_allocator]`.
///
/// The lock is only ever taken with interrupts off, so a task can not be
/// preempted while holding it and a spawn running inside the scheduler's
/// critical section never waits on a descheduled owner.
pub struct LockedHeap<I = Cpu> {
    inner: Mutex<Heap>,
    irq: I,
}

impl LockedHeap<Cpu> {
    pub const fn new() -> Self {
        Self::with_irq(Cpu)
    }
}

impl<I: InterruptControl> LockedHeap<I> {
    pub const fn with_irq(irq: I) -> Self {
        Self {
            inner: Mutex::new(Heap::empty()),
            irq,
        }
    }

    /// # Safety
    /// Same contract as [`Heap::init`].
    pub unsafe fn init(&self, start: usize, size: usize) -> Result<(), AllocError> {
        self.irq
            .without_interrupts(|| unsafe { self.inner.lock().init(start, size) })
    }

    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.irq.without_interrupts(|| self.inner.lock().allocate(size))
    }

    /// # Safety
    /// Same contract as [`Heap::free`].
    pub unsafe fn free(&self, ptr: NonNull<u8>) {
        self.irq
            .without_interrupts(|| unsafe { self.inner.lock().free(ptr) })
    }

    pub fn stats(&self) -> HeapStats {
        self.irq.without_interrupts(|| self.inner.lock().stats())
    }
}

unsafe impl<I: InterruptControl + Sync> GlobalAlloc for LockedHeap<I> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > BLOCK_ALIGN {
            return ptr::null_mut();
        }
        self.allocate(layout.size())
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            self.free(ptr);
        }
    }
}

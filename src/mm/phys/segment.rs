//! Segmento físico: range contíguo de um único domínio e free list.

use super::FreeListKind;
use crate::mm::addr::PhysAddr;
use crate::mm::config::{PAGE_SHIFT, PAGE_SIZE};
use crate::mm::page::PageId;

/// Segmento de memória física
///
/// Criado por `SegmentRegistry::initialize` e imutável depois.
#[derive(Debug, Clone)]
pub struct Segment {
    pub(crate) start: PhysAddr,
    pub(crate) end: PhysAddr,
    pub(crate) domain: usize,
    /// Descritor da primeira página do segmento
    pub(crate) first_page: PageId,
    pub(crate) freelist: FreeListKind,
}

impl Segment {
    #[inline]
    pub fn start(&self) -> PhysAddr {
        self.start
    }

    #[inline]
    pub fn end(&self) -> PhysAddr {
        self.end
    }

    #[inline]
    pub fn domain(&self) -> usize {
        self.domain
    }

    #[inline]
    pub fn first_page(&self) -> PageId {
        self.first_page
    }

    #[inline]
    pub fn freelist(&self) -> FreeListKind {
        self.freelist
    }

    /// Número de páginas
    #[inline]
    pub fn npages(&self) -> usize {
        (self.end.offset_from(self.start) >> PAGE_SHIFT) as usize
    }

    #[inline]
    pub fn contains(&self, pa: PhysAddr) -> bool {
        pa >= self.start && pa < self.end
    }

    /// Range `[pa, pa + size)` inteiramente dentro do segmento?
    #[inline]
    pub fn contains_range(&self, pa: PhysAddr, size: u64) -> bool {
        pa >= self.start && pa <= self.end && size <= self.end.offset_from(pa)
    }

    /// Descritor da página em `pa` (que deve estar no segmento)
    #[inline]
    pub fn page_at(&self, pa: PhysAddr) -> PageId {
        debug_assert!(self.contains(pa));
        self.first_page
            .offset((pa.offset_from(self.start) / PAGE_SIZE) as usize)
    }

    /// Endereço da página `id` (que deve estar no segmento)
    #[inline]
    pub fn page_addr(&self, id: PageId) -> PhysAddr {
        self.start
            .add((id.index() - self.first_page.index()) as u64 * PAGE_SIZE)
    }
}

//! # Page Descriptor
//!
//! Metadados de uma página física. Um descritor por página, referenciado por
//! índice (`PageId`) no array do alocador.
//!
//! O descritor pertence, a cada instante, a exatamente um dono: uma free
//! list, uma fila de páginas ou o chamador que o alocou. Os campos são
//! atômicos apenas para mutabilidade interior através de `&[Page]`; a
//! consistência vem do lock do dono atual.

use core::sync::atomic::{AtomicU16, AtomicU8, Ordering};

use bitflags::bitflags;

use crate::klib::list::{Linked, Links};
use crate::mm::addr::PhysAddr;
use crate::mm::config::{MAXMEMDOM, NFREEORDER};
use crate::mm::pagequeue::{PageQueueKind, PQ_COUNT};
use crate::mm::phys::FreePool;

// =============================================================================
// IDENTIFICADOR
// =============================================================================

/// Índice de um descritor de página
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(pub(crate) u32);

impl PageId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// `n` páginas adiante
    #[inline]
    pub const fn offset(self, n: usize) -> Self {
        Self(self.0 + n as u32)
    }
}

/// Marca "sem segmento" (marcadores e páginas fictícias)
pub const SEGIND_NONE: u16 = u16::MAX;

/// Valor de `order` para página que não é cabeça de bloco livre
const ORDER_NONE: u8 = NFREEORDER as u8;

/// Valor de `queue` para página fora de qualquer fila
const QUEUE_NONE: u8 = u8::MAX;

// `queue` codifica domínio × fila em um byte
const _: () = assert!(MAXMEMDOM * PQ_COUNT < QUEUE_NONE as usize);

// =============================================================================
// FLAGS
// =============================================================================

bitflags! {
    /// Flags de um descritor de página
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u16 {
        /// Página sintetizada para range sem memória normal (device memory)
        const FICTITIOUS = 1 << 0;
        /// Marcador de varredura: não possui página, apenas posição na fila
        const MARKER = 1 << 1;
    }
}

/// Atributo de memória (tipo de cache)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MemAttr {
    WriteBack = 0,
    WriteThrough = 1,
    Uncacheable = 2,
    WriteCombining = 3,
    WriteProtected = 4,
}

impl MemAttr {
    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::WriteThrough,
            2 => Self::Uncacheable,
            3 => Self::WriteCombining,
            4 => Self::WriteProtected,
            _ => Self::WriteBack,
        }
    }
}

// =============================================================================
// PAGE
// =============================================================================

#[repr(C, align(32))]
pub struct Page {
    phys_addr: PhysAddr,
    /// Segmento dono (SEGIND_NONE se não houver)
    segind: u16,
    /// Ordem do bloco livre do qual esta página é cabeça
    order: AtomicU8,
    pool: AtomicU8,
    queue: AtomicU8,
    memattr: AtomicU8,
    flags: AtomicU16,
    links: Links,
}

impl Page {
    pub(crate) const fn new(phys_addr: PhysAddr, segind: u16) -> Self {
        Self {
            phys_addr,
            segind,
            order: AtomicU8::new(ORDER_NONE),
            pool: AtomicU8::new(FreePool::Default as u8),
            queue: AtomicU8::new(QUEUE_NONE),
            memattr: AtomicU8::new(MemAttr::WriteBack as u8),
            flags: AtomicU16::new(0),
            links: Links::new(),
        }
    }

    pub(crate) fn marker() -> Self {
        let page = Self::new(PhysAddr::new(0), SEGIND_NONE);
        page.flags.store(PageFlags::MARKER.bits(), Ordering::Relaxed);
        page
    }

    pub(crate) fn fictitious(phys_addr: PhysAddr, memattr: MemAttr) -> Self {
        let page = Self::new(phys_addr, SEGIND_NONE);
        page.flags
            .store(PageFlags::FICTITIOUS.bits(), Ordering::Relaxed);
        page.memattr.store(memattr as u8, Ordering::Relaxed);
        page
    }

    #[inline]
    pub fn phys_addr(&self) -> PhysAddr {
        self.phys_addr
    }

    /// Índice do segmento dono
    #[inline]
    pub fn segind(&self) -> Option<usize> {
        (self.segind != SEGIND_NONE).then_some(self.segind as usize)
    }

    /// Ordem do bloco livre que começa nesta página (None se não for cabeça)
    #[inline]
    pub fn free_order(&self) -> Option<usize> {
        let order = self.order.load(Ordering::Relaxed);
        (order != ORDER_NONE).then_some(order as usize)
    }

    #[inline]
    pub(crate) fn set_free_order(&self, order: Option<usize>) {
        let raw = order.map_or(ORDER_NONE, |o| o as u8);
        self.order.store(raw, Ordering::Relaxed);
    }

    #[inline]
    pub fn pool(&self) -> FreePool {
        FreePool::from_index(self.pool.load(Ordering::Relaxed) as usize)
    }

    #[inline]
    pub(crate) fn set_pool(&self, pool: FreePool) {
        self.pool.store(pool as u8, Ordering::Relaxed);
    }

    /// Fila em que a página está
    #[inline]
    pub fn queue(&self) -> Option<PageQueueKind> {
        self.queue_owner().map(|(_, kind)| kind)
    }

    /// Domínio e fila em que a página está
    #[inline]
    pub fn queue_owner(&self) -> Option<(usize, PageQueueKind)> {
        let raw = self.queue.load(Ordering::Relaxed);
        if raw == QUEUE_NONE {
            return None;
        }
        let raw = raw as usize;
        Some((raw / PQ_COUNT, PageQueueKind::from_index(raw % PQ_COUNT)?))
    }

    #[inline]
    pub(crate) fn set_queue(&self, owner: Option<(usize, PageQueueKind)>) {
        let raw = owner.map_or(QUEUE_NONE, |(domain, kind)| {
            (domain * PQ_COUNT + kind as usize) as u8
        });
        self.queue.store(raw, Ordering::Relaxed);
    }

    #[inline]
    pub fn flags(&self) -> PageFlags {
        PageFlags::from_bits_truncate(self.flags.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_marker(&self) -> bool {
        self.flags().contains(PageFlags::MARKER)
    }

    #[inline]
    pub fn is_fictitious(&self) -> bool {
        self.flags().contains(PageFlags::FICTITIOUS)
    }

    #[inline]
    pub fn memattr(&self) -> MemAttr {
        MemAttr::from_bits(self.memattr.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_memattr(&self, memattr: MemAttr) {
        self.memattr.store(memattr as u8, Ordering::Relaxed);
    }
}

impl Linked for Page {
    #[inline]
    fn links(&self) -> &Links {
        &self.links
    }
}

impl core::fmt::Debug for Page {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Page")
            .field("phys_addr", &self.phys_addr)
            .field("segind", &self.segind())
            .field("free_order", &self.free_order())
            .field("pool", &self.pool())
            .field("queue", &self.queue())
            .field("flags", &self.flags())
            .finish()
    }
}

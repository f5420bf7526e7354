//! # Physical Memory Allocator
//!
//! Alocador de páginas físicas: buddy por domínio NUMA, free list e pool.
//!
//! ## 🏗️ Arquitetura
//!
//! ```text
//! SegmentRegistry ──initialize()──▶ PhysAllocator
//!                                    ├── pages[]    descritores (reais + marcadores)
//!                                    ├── segs[]     ordenados por endereço
//!                                    ├── domains[]  free lists + filas + contadores
//!                                    └── fictitious ranges sem descritor real
//! ```
//!
//! - `alloc_pages` → escolhe domínio (round-robin), procura da ordem pedida
//!   para cima e divide o bloco encontrado
//! - `free_pages`  → funde com o buddy (XOR no bit da ordem) enquanto ele
//!   estiver livre na mesma ordem, dentro do mesmo segmento
//!
//! Exaustão nunca bloqueia: retorna `None` e o chamador decide se aciona o
//! reclaim e tenta de novo.
//!
//! ## Contexto explícito
//!
//! `PhysAllocator` é um valor comum passado a quem precisa. Para o kernel há
//! também um handle global de inicialização única (`install`/`get`).

mod buddy;
mod contig;
mod domain;
mod fictitious;
mod freelist;
mod registry;
mod segment;

pub use contig::{ContigReclaimer, ScanFlags};
pub use domain::Domain;
pub use fictitious::{FictitiousPage, FictitiousRange};
pub use freelist::{FreeListKind, FreePool};
pub use registry::{MemAffinity, SegmentRegistry};
pub use segment::Segment;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use spin::{Once, RwLock};

use crate::counter::Counter;
use crate::mm::addr::PhysAddr;
use crate::mm::page::{Page, PageId};
use crate::mm::pagequeue::PageQueue;
use domain::NMARKERS;

// =============================================================================
// ALOCADOR
// =============================================================================

/// Estado do alocador físico. Construído por `SegmentRegistry::initialize`.
pub struct PhysAllocator {
    /// Descritores: páginas reais (por segmento) seguidas dos marcadores
    pages: Box<[Page]>,
    /// Número de descritores de páginas reais
    nreal: usize,
    segs: Box<[Segment]>,
    domains: Box<[Domain]>,
    /// A free list Dma32 existe (há memória acima de 4 GB)
    dma32_used: bool,
    /// Matriz ndomains × ndomains de distâncias
    locality: Option<Box<[i32]>>,
    free_count: Counter,
    page_count: AtomicU64,
    /// Cursor round-robin de domínio
    next_domain: AtomicUsize,
    oom_votes: AtomicUsize,
    oom_seq_threshold: u32,
    fictitious: RwLock<BTreeMap<u64, Arc<FictitiousRange>>>,
}

impl PhysAllocator {
    // =========================================================================
    // CONSULTAS
    // =========================================================================

    /// Array de descritores (páginas reais e marcadores)
    #[inline]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    #[inline]
    pub fn page(&self, id: PageId) -> &Page {
        &self.pages[id.index()]
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segs
    }

    #[inline]
    pub fn ndomains(&self) -> usize {
        self.domains.len()
    }

    #[inline]
    pub fn domain(&self, domain: usize) -> &Domain {
        &self.domains[domain]
    }

    #[inline]
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    /// A free list existe nesta máquina?
    pub fn has_freelist(&self, fl: FreeListKind) -> bool {
        fl != FreeListKind::Dma32 || self.dma32_used
    }

    /// Páginas livres no sistema (aproximado).
    ///
    /// Os ajustes acontecem fora do lock do domínio: a soma pode ficar
    /// negativa por um instante e é lida como zero.
    #[inline]
    pub fn free_count(&self) -> u64 {
        self.free_count.fetch_i64().max(0) as u64
    }

    /// Páginas adicionadas ao alocador
    #[inline]
    pub fn page_count(&self) -> u64 {
        self.page_count.load(Ordering::Relaxed)
    }

    /// Índice do segmento que contém `pa`
    pub fn segind_of(&self, pa: PhysAddr) -> Option<usize> {
        let idx = self.segs.partition_point(|s| s.end <= pa);
        self.segs
            .get(idx)
            .filter(|s| s.contains(pa))
            .map(|_| idx)
    }

    /// Descritor da página real em `pa`
    pub fn paddr_to_page(&self, pa: PhysAddr) -> Option<PageId> {
        let seg = &self.segs[self.segind_of(pa)?];
        Some(seg.page_at(pa.align_down(crate::mm::config::PAGE_SIZE)))
    }

    /// Domínio dono da página (ou do marcador)
    pub fn page_domain(&self, id: PageId) -> &Domain {
        match self.pages[id.index()].segind() {
            Some(segind) => &self.domains[self.segs[segind].domain],
            None => {
                assert!(
                    id.index() >= self.nreal,
                    "(Phys) Descritor sem segmento fora da área de marcadores"
                );
                &self.domains[(id.index() - self.nreal) / NMARKERS]
            }
        }
    }

    /// Fila de páginas em que a página está
    pub fn page_pagequeue(&self, id: PageId) -> Option<&PageQueue> {
        let (domain, kind) = self.pages[id.index()].queue_owner()?;
        Some(self.domains[domain].pagequeue(kind))
    }

    /// Algum segmento de `mask` intersecta `[low, high)`?
    pub fn domain_intersects(&self, mask: u64, low: PhysAddr, high: PhysAddr) -> bool {
        let mut mask = mask;
        while mask != 0 {
            let idx = mask.trailing_zeros() as usize;
            mask &= !(1u64 << idx);
            if let Some(s) = self.segs.get(idx) {
                if low < s.end && high > s.start {
                    return true;
                }
            }
        }
        false
    }

    /// Distância entre domínios `from` e `to` (-1 se desconhecida)
    pub fn mem_affinity(&self, from: usize, to: usize) -> i32 {
        let n = self.domains.len();
        match &self.locality {
            Some(matrix) if from < n && to < n => matrix[from * n + to],
            _ => -1,
        }
    }

    // =========================================================================
    // CONTABILIDADE
    // =========================================================================

    /// Ajusta as contagens de livres global e do domínio.
    ///
    /// Chamado FORA do lock do domínio: a contagem é apenas aproximadamente
    /// sincronizada com o conteúdo das free lists.
    #[inline]
    fn freecnt_adj(&self, domain: usize, adj: i64) {
        self.free_count.add(adj);
        self.domains[domain].freecnt_add(adj);
    }

    /// Domínio inicial do próximo pedido round-robin
    #[inline]
    fn next_domain(&self) -> usize {
        self.next_domain.fetch_add(1, Ordering::Relaxed) % self.domains.len()
    }

    /// Registra uma passada do pagedaemon do domínio.
    ///
    /// Retorna true quando este domínio completou o quorum de OOM: todos os
    /// domínios passaram `oom_seq` passadas seguidas sem reduzir o déficit.
    /// O chamador deve então escolher e sinalizar a vítima.
    pub fn pageout_oom_vote(&self, domain: usize, starting_shortage: i64, shortage: i64) -> bool {
        self.domains[domain].oom_vote(
            starting_shortage,
            shortage,
            self.oom_seq_threshold,
            &self.oom_votes,
            self.domains.len(),
        )
    }
}

// =============================================================================
// HANDLE GLOBAL
// =============================================================================

static PHYS: Once<PhysAllocator> = Once::new();

/// Instala o alocador global. Deve ser chamado uma única vez no boot.
pub fn install(allocator: PhysAllocator) -> &'static PhysAllocator {
    let mut installed = false;
    let phys = PHYS.call_once(|| {
        installed = true;
        allocator
    });
    assert!(installed, "(Phys) Alocador físico já instalado");
    phys
}

/// Alocador global, se já instalado
#[inline]
pub fn get() -> Option<&'static PhysAllocator> {
    PHYS.get()
}

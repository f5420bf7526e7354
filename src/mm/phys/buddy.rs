//! # Buddy Allocator
//!
//! Alocação por split e liberação por coalescência sobre as free lists de
//! cada domínio.
//!
//! ## Estados de um bloco
//!
//! ```text
//! livre (lista da ordem k) ──alloc──▶ alocado (dono: chamador)
//!      ▲    │                               │
//!      │    └─split──▶ 2 × livre (k-1)      │
//!      └──────merge◀── buddy livre (k) ◀────┘ free
//! ```
//!
//! Páginas dentro de um bloco não têm estado próprio: só a cabeça carrega a
//! ordem (`Page::free_order`).

use super::freelist::FreeQueues;
use super::{FreeListKind, FreePool, PhysAllocator, Segment};
use crate::mm::addr::PhysAddr;
use crate::mm::config::{NFREEORDER, PAGE_SIZE};
use crate::mm::page::PageId;

impl PhysAllocator {
    // =========================================================================
    // ALOCAÇÃO
    // =========================================================================

    /// Aloca um bloco de `2^order` páginas do `pool`.
    ///
    /// Tenta os domínios em round-robin e, em cada um, as free lists na ordem
    /// Default → Dma32 → LowMem. Retorna `None` se nenhum domínio tiver um
    /// bloco grande o bastante.
    pub fn alloc_pages(&self, pool: FreePool, order: usize) -> Option<PageId> {
        assert!(order < NFREEORDER, "(Phys) Ordem inválida");

        let n = self.domains.len();
        let start = self.next_domain();
        for i in 0..n {
            if let Some(m) = self.alloc_pages_domain((start + i) % n, pool, order) {
                return Some(m);
            }
        }

        crate::ktrace!("(Phys) alloc_pages sem bloco livre, ordem=", order);
        None
    }

    /// Como `alloc_pages`, restrito a um domínio
    pub fn alloc_pages_domain(&self, domain: usize, pool: FreePool, order: usize) -> Option<PageId> {
        assert!(order < NFREEORDER, "(Phys) Ordem inválida");

        FreeListKind::ALL
            .iter()
            .filter(|&&fl| self.has_freelist(fl))
            .find_map(|&fl| self.alloc_domain_pages(domain, fl, pool, order))
    }

    /// Aloca apenas da free list `freelist` (ex.: memória abaixo de 16 MB)
    pub fn alloc_freelist_pages(
        &self,
        freelist: FreeListKind,
        pool: FreePool,
        order: usize,
    ) -> Option<PageId> {
        assert!(order < NFREEORDER, "(Phys) Ordem inválida");
        if !self.has_freelist(freelist) {
            return None;
        }

        let n = self.domains.len();
        let start = self.next_domain();
        (0..n).find_map(|i| self.alloc_domain_pages((start + i) % n, freelist, pool, order))
    }

    fn alloc_domain_pages(
        &self,
        domain: usize,
        fl: FreeListKind,
        pool: FreePool,
        order: usize,
    ) -> Option<PageId> {
        let m = {
            let mut fq = self.domains[domain].free.lock();
            self.alloc_locked(&mut fq, fl, pool, order)?
        };
        self.freecnt_adj(domain, -(1i64 << order));
        Some(m)
    }

    fn alloc_locked(
        &self,
        fq: &mut FreeQueues,
        fl: FreeListKind,
        pool: FreePool,
        order: usize,
    ) -> Option<PageId> {
        for oind in order..NFREEORDER {
            if let Some(m) = fq.first(fl, pool, oind) {
                fq.remove(&self.pages, m, fl, oind);
                self.split_pages(fq, m, oind, fl, order);
                return Some(m);
            }
        }

        // O pool pedido está vazio: pegar o maior bloco de qualquer pool,
        // transferi-lo para o pool pedido e dividi-lo.
        for oind in (order..NFREEORDER).rev() {
            for alt in FreePool::ALL {
                if let Some(m) = fq.first(fl, alt, oind) {
                    fq.remove(&self.pages, m, fl, oind);
                    self.set_pool(pool, m, oind);
                    self.split_pages(fq, m, oind, fl, order);
                    return Some(m);
                }
            }
        }
        None
    }

    /// Divide o bloco `m` de ordem `oind` até `order`, devolvendo as metades
    /// superiores às free lists.
    fn split_pages(
        &self,
        fq: &mut FreeQueues,
        m: PageId,
        mut oind: usize,
        fl: FreeListKind,
        order: usize,
    ) {
        while oind > order {
            oind -= 1;
            let buddy = m.offset(1 << oind);
            fq.add(&self.pages, buddy, fl, oind, true);
        }
    }

    /// Marca todas as páginas do bloco como pertencentes a `pool`.
    ///
    /// O bloco não pode estar em uma free list.
    pub fn set_pool(&self, pool: FreePool, m: PageId, order: usize) {
        for page in &self.pages[m.index()..m.index() + (1 << order)] {
            page.set_pool(pool);
        }
    }

    // =========================================================================
    // LIBERAÇÃO
    // =========================================================================

    /// Devolve o bloco `m` de `2^order` páginas, fundindo com buddies livres.
    ///
    /// # Panics
    /// Bloco já livre, desalinhado ou fora de um segmento.
    pub fn free_pages(&self, m: PageId, order: usize) {
        assert!(order < NFREEORDER, "(Phys) Ordem inválida");
        let seg = self.segment_of(m);

        {
            let mut fq = self.domains[seg.domain].free.lock();
            self.free_locked(&mut fq, seg, m, order);
        }
        self.freecnt_adj(seg.domain, 1i64 << order);
    }

    pub(crate) fn segment_of(&self, m: PageId) -> &Segment {
        match self.pages[m.index()].segind() {
            Some(segind) => &self.segs[segind],
            None => panic!("(Phys) Página sem segmento (marcador ou fictícia)"),
        }
    }

    pub(crate) fn free_locked(
        &self,
        fq: &mut FreeQueues,
        seg: &Segment,
        mut m: PageId,
        mut order: usize,
    ) {
        let page = &self.pages[m.index()];
        let mut pa = page.phys_addr();
        assert!(page.free_order().is_none(), "(Phys) Double free: bloco já livre");
        assert!(
            pa.is_aligned(PAGE_SIZE << order) && seg.contains_range(pa, PAGE_SIZE << order),
            "(Phys) Bloco desalinhado ou fora do segmento"
        );

        let pool = page.pool();
        while order < NFREEORDER - 1 {
            let buddy_pa = pa.buddy(order);
            if !seg.contains(buddy_pa) {
                break;
            }
            let buddy = seg.page_at(buddy_pa);
            if self.pages[buddy.index()].free_order() != Some(order) {
                break;
            }

            fq.remove(&self.pages, buddy, seg.freelist, order);
            if self.pages[buddy.index()].pool() != pool {
                self.set_pool(pool, buddy, order);
            }
            order += 1;
            pa = pa.align_down(PAGE_SIZE << order);
            m = seg.page_at(pa);
        }

        fq.add(&self.pages, m, seg.freelist, order, false);
    }

    /// Libera `npages` páginas a partir de `pa`, em blocos naturalmente
    /// alinhados (com coalescência).
    pub(crate) fn free_range_locked(
        &self,
        fq: &mut FreeQueues,
        seg: &Segment,
        mut pa: PhysAddr,
        mut npages: u64,
    ) {
        while npages > 0 {
            let order = max_block_order(pa, npages);
            self.free_locked(fq, seg, seg.page_at(pa), order);
            pa = pa.add(PAGE_SIZE << order);
            npages -= 1 << order;
        }
    }

    /// Insere `[pa, end)` nas free lists SEM coalescência.
    ///
    /// Apenas para sobras de um bloco livre que acabou de ser recortado:
    /// essas sobras nunca têm buddy livre.
    pub(crate) fn enqueue_range(
        &self,
        fq: &mut FreeQueues,
        seg: &Segment,
        mut pa: PhysAddr,
        end: PhysAddr,
        pool: FreePool,
    ) {
        while pa < end {
            let order = max_block_order(pa, end.offset_from(pa) / PAGE_SIZE);
            let m = seg.page_at(pa);
            self.set_pool(pool, m, order);
            fq.add(&self.pages, m, seg.freelist, order, false);
            pa = pa.add(PAGE_SIZE << order);
        }
    }

    /// Bloco livre que contém a página em `pa`: (cabeça, ordem)
    pub(crate) fn containing_free_block(
        &self,
        seg: &Segment,
        pa: PhysAddr,
    ) -> Option<(PageId, usize)> {
        for order in 0..NFREEORDER {
            let head = pa.align_down(PAGE_SIZE << order);
            if head < seg.start {
                return None;
            }
            let id = seg.page_at(head);
            match self.pages[id.index()].free_order() {
                Some(o) if o >= order => return Some((id, o)),
                // Cabeça livre menor que não alcança `pa`: nada maior contém
                Some(_) => return None,
                None => {}
            }
        }
        None
    }

    // =========================================================================
    // RESERVA
    // =========================================================================

    /// Retira a página livre `m` das free lists sem contabilizá-la como
    /// alocada (as contagens de livres não mudam).
    ///
    /// O bloco livre que contém `m` é dividido repetidamente e as metades
    /// que não contêm `m` voltam às listas. Retorna false se `m` não estava
    /// livre.
    pub fn unfree_page(&self, m: PageId) -> bool {
        let page = &self.pages[m.index()];
        let Some(segind) = page.segind() else {
            return false;
        };
        let seg = &self.segs[segind];
        let target = page.phys_addr();

        let mut fq = self.domains[seg.domain].free.lock();
        let Some((set, mut order)) = self.containing_free_block(seg, target) else {
            return false;
        };

        fq.remove(&self.pages, set, seg.freelist, order);
        let mut set_pa = seg.page_addr(set);
        while order > 0 {
            order -= 1;
            let half = set_pa.buddy(order);
            if target < half {
                fq.add(&self.pages, seg.page_at(half), seg.freelist, order, false);
            } else {
                fq.add(&self.pages, seg.page_at(set_pa), seg.freelist, order, false);
                set_pa = half;
            }
        }
        assert_eq!(set_pa, target, "(Phys) unfree_page: inconsistência fatal");
        true
    }

    // =========================================================================
    // POPULAÇÃO
    // =========================================================================

    /// Adiciona a página em `pa` ao alocador e a libera.
    ///
    /// Cada página deve ser adicionada uma única vez.
    pub fn add_page(&self, pa: PhysAddr) {
        let Some(segind) = self.segind_of(pa) else {
            panic!("(Phys) add_page: endereço fora dos segmentos");
        };
        let seg = &self.segs[segind];
        let m = seg.page_at(pa);
        let page = &self.pages[m.index()];
        page.set_queue(None);
        page.set_pool(FreePool::Default);

        self.page_count
            .fetch_add(1, core::sync::atomic::Ordering::Relaxed);
        self.domains[seg.domain].page_count_add(1);

        {
            let mut fq = self.domains[seg.domain].free.lock();
            self.free_locked(&mut fq, seg, m, 0);
        }
        self.freecnt_adj(seg.domain, 1);
    }

    /// Adiciona todas as páginas de todos os segmentos
    pub fn populate(&self) {
        for seg in self.segs.iter() {
            let n = seg.npages() as u64;
            self.page_count
                .fetch_add(n, core::sync::atomic::Ordering::Relaxed);
            self.domains[seg.domain].page_count_add(n);

            {
                let mut fq = self.domains[seg.domain].free.lock();
                self.free_range_locked(&mut fq, seg, seg.start, n);
            }
            self.freecnt_adj(seg.domain, n as i64);
        }
        crate::kinfo!("(Phys) Páginas livres=", self.free_count());
    }

    // =========================================================================
    // INSPEÇÃO
    // =========================================================================

    /// Visita cada bloco livre do domínio (cabeça, ordem) sob o lock
    pub fn for_each_free_block(&self, domain: usize, mut f: impl FnMut(PageId, usize)) {
        let fq = self.domains[domain].free.lock();
        for fl in FreeListKind::ALL {
            for pool in FreePool::ALL {
                for order in 0..NFREEORDER {
                    for id in fq.list(fl, pool, order).iter(&self.pages) {
                        f(PageId(id), order);
                    }
                }
            }
        }
    }

    /// Número de blocos livres por ordem no domínio
    pub fn free_blocks(&self, domain: usize) -> [usize; NFREEORDER] {
        let fq = self.domains[domain].free.lock();
        let mut counts = [0usize; NFREEORDER];
        for fl in FreeListKind::ALL {
            for pool in FreePool::ALL {
                for (order, slot) in counts.iter_mut().enumerate() {
                    *slot += fq.count(fl, pool, order);
                }
            }
        }
        counts
    }
}

/// Maior ordem de bloco naturalmente alinhado em `pa` que cabe em `npages`
pub(crate) fn max_block_order(pa: PhysAddr, npages: u64) -> usize {
    debug_assert!(npages > 0);
    let align = pa.pfn().trailing_zeros() as usize;
    let fit = (63 - npages.leading_zeros()) as usize;
    align.min(fit).min(NFREEORDER - 1)
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{assert_buddy_invariant, free_blocks, listed_free_pages, populated};
    use super::*;
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    const MIB: u64 = 1024 * 1024;

    fn xorshift(seed: &mut u64) -> u64 {
        *seed ^= *seed << 13;
        *seed ^= *seed >> 7;
        *seed ^= *seed << 17;
        *seed
    }

    #[test]
    fn test_max_block_order() {
        assert_eq!(max_block_order(PhysAddr::new(0), 1), 0);
        assert_eq!(max_block_order(PhysAddr::new(0x8000), 16), 3);
        assert_eq!(max_block_order(PhysAddr::new(0x8000), 5), 2);
        assert_eq!(max_block_order(PhysAddr::new(0x1000), 64), 0);
        assert_eq!(max_block_order(PhysAddr::new(0), 1 << 20), NFREEORDER - 1);
    }

    #[test]
    fn test_populate_coalesces_fully() {
        // 16 MiB alinhados = exatamente um bloco de ordem máxima
        let phys = populated(&[(16 * MIB, 32 * MIB)]);
        assert_eq!(free_blocks(&phys, 0), [(16 * MIB, NFREEORDER - 1)]);
        assert_eq!(phys.free_count(), 4096);
        assert_eq!(phys.page_count(), 4096);
        assert_eq!(phys.domain(0).free_count(), 4096);
    }

    #[test]
    fn test_split_and_merge_back() {
        let phys = populated(&[(16 * MIB, 16 * MIB + 64 * PAGE_SIZE)]);
        assert_eq!(phys.free_blocks(0)[6], 1);

        let m = phys.alloc_pages(FreePool::Default, 0).unwrap();
        assert_eq!(phys.page(m).phys_addr(), PhysAddr::new(16 * MIB));
        // Split de 64 páginas: sobra um bloco de cada ordem 0..=5
        let counts = phys.free_blocks(0);
        for order in 0..6 {
            assert_eq!(counts[order], 1, "ordem {}", order);
        }
        assert_eq!(phys.free_count(), 63);
        assert_buddy_invariant(&phys, 0);

        phys.free_pages(m, 0);
        assert_eq!(free_blocks(&phys, 0), [(16 * MIB, 6)]);
        assert_eq!(phys.free_count(), 64);
    }

    #[test]
    fn test_conservation_and_buddy_invariant() {
        let phys = populated(&[(16 * MIB, 16 * MIB + 256 * PAGE_SIZE), (40 * MIB, 40 * MIB + 100 * PAGE_SIZE)]);
        let total = phys.domain(0).page_count();
        assert_eq!(total, 356);

        let mut held: Vec<(PageId, usize)> = Vec::new();
        let mut seed = 0x2545_F491_4F6C_DD1Du64;
        for step in 0..400 {
            xorshift(&mut seed);

            if seed % 3 != 0 || held.is_empty() {
                let order = (seed >> 8) as usize % 4;
                let pool = FreePool::ALL[(seed >> 16) as usize % 2];
                if let Some(m) = phys.alloc_pages(pool, order) {
                    held.push((m, order));
                }
            } else {
                let idx = (seed >> 24) as usize % held.len();
                let (m, order) = held.swap_remove(idx);
                phys.free_pages(m, order);
            }

            if step % 50 == 0 {
                let allocated: u64 = held.iter().map(|&(_, o)| 1u64 << o).sum();
                assert_eq!(allocated + listed_free_pages(&phys, 0), total);
                assert_buddy_invariant(&phys, 0);
            }
        }

        for (m, order) in held.drain(..) {
            phys.free_pages(m, order);
        }
        assert_eq!(listed_free_pages(&phys, 0), total);
        assert_eq!(phys.free_count(), total);
        assert_buddy_invariant(&phys, 0);
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let phys = populated(&[(16 * MIB, 16 * MIB + 4 * PAGE_SIZE)]);
        assert!(phys.alloc_pages(FreePool::Default, 3).is_none());
        let m = phys.alloc_pages(FreePool::Default, 2).unwrap();
        assert!(phys.alloc_pages(FreePool::Default, 0).is_none());
        assert_eq!(phys.free_count(), 0);
        phys.free_pages(m, 2);
        assert_eq!(phys.free_count(), 4);
    }

    #[test]
    fn test_pool_stealing_retags_block() {
        let phys = populated(&[(16 * MIB, 16 * MIB + 8 * PAGE_SIZE)]);
        let m = phys.alloc_pages(FreePool::Direct, 1).unwrap();
        assert_eq!(phys.page(m).pool(), FreePool::Direct);
        assert_eq!(phys.page(m.offset(1)).pool(), FreePool::Direct);

        // As sobras do split também foram para o pool Direct
        let m2 = phys.alloc_pages(FreePool::Direct, 2).unwrap();
        assert_eq!(phys.page(m2).pool(), FreePool::Direct);

        phys.free_pages(m, 1);
        phys.free_pages(m2, 2);
        assert_eq!(free_blocks(&phys, 0), [(16 * MIB, 3)]);
    }

    #[test]
    fn test_freelist_fallback_order() {
        let phys = populated(&[(8 * MIB, 8 * MIB + 4 * PAGE_SIZE), (64 * MIB, 64 * MIB + 4 * PAGE_SIZE)]);
        // Default antes de LowMem
        let m = phys.alloc_pages(FreePool::Default, 2).unwrap();
        assert_eq!(phys.page(m).phys_addr(), PhysAddr::new(64 * MIB));

        let low = phys.alloc_freelist_pages(FreeListKind::LowMem, FreePool::Default, 0).unwrap();
        assert_eq!(phys.page(low).phys_addr(), PhysAddr::new(8 * MIB));
        assert!(phys.alloc_freelist_pages(FreeListKind::Default, FreePool::Default, 0).is_none());
        assert!(phys.alloc_freelist_pages(FreeListKind::Dma32, FreePool::Default, 0).is_none());
    }

    #[test]
    fn test_unfree_page_extracts_single_page() {
        let phys = populated(&[(16 * MIB, 16 * MIB + 8 * PAGE_SIZE)]);
        let target = phys.paddr_to_page(PhysAddr::new(16 * MIB + 5 * PAGE_SIZE)).unwrap();

        assert!(phys.unfree_page(target));
        assert!(!phys.unfree_page(target));
        assert_eq!(listed_free_pages(&phys, 0), 7);
        assert_buddy_invariant(&phys, 0);
        assert_eq!(
            free_blocks(&phys, 0),
            [(16 * MIB, 2), (16 * MIB + 4 * PAGE_SIZE, 0), (16 * MIB + 6 * PAGE_SIZE, 1)]
        );
        // As contagens não mudam
        assert_eq!(phys.free_count(), 8);
    }

    #[test]
    #[should_panic(expected = "Double free")]
    fn test_double_free_is_fatal() {
        let phys = populated(&[(16 * MIB, 16 * MIB + 8 * PAGE_SIZE)]);
        let m = phys.alloc_pages(FreePool::Default, 1).unwrap();
        phys.free_pages(m, 1);
        phys.free_pages(m, 1);
    }

    #[test]
    fn test_add_page_individually() {
        let mut reg = super::super::SegmentRegistry::new();
        reg.add_segment(PhysAddr::new(16 * MIB), PhysAddr::new(16 * MIB + 4 * PAGE_SIZE));
        let phys = reg.initialize();
        assert!(phys.alloc_pages(FreePool::Default, 0).is_none());

        for i in 0..4 {
            phys.add_page(PhysAddr::new(16 * MIB + i * PAGE_SIZE));
        }
        assert_eq!(free_blocks(&phys, 0), [(16 * MIB, 2)]);
        assert_eq!(phys.domain(0).page_count(), 4);
        assert_eq!(phys.free_count(), 4);
    }

    #[test]
    fn test_concurrent_alloc_free_conserves_pages() {
        crate::hal::testing::install();

        let phys = Arc::new(populated(&[(16 * MIB, 16 * MIB + 512 * PAGE_SIZE)]));
        let total = phys.page_count();

        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let phys = phys.clone();
                std::thread::spawn(move || {
                    let mut held: Vec<(PageId, usize)> = Vec::new();
                    let mut seed = 0x9E37_79B9_7F4A_7C15u64 ^ (t + 1);
                    for _ in 0..2000 {
                        let r = xorshift(&mut seed);
                        if r % 3 != 0 || held.is_empty() {
                            let order = (r >> 8) as usize % 4;
                            let pool = FreePool::ALL[(r >> 16) as usize % 2];
                            if let Some(m) = phys.alloc_pages(pool, order) {
                                assert_eq!(phys.page(m).free_order(), None);
                                held.push((m, order));
                            }
                        } else {
                            let (m, order) = held.swap_remove((r >> 24) as usize % held.len());
                            phys.free_pages(m, order);
                        }
                    }
                    for (m, order) in held {
                        phys.free_pages(m, order);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(listed_free_pages(&phys, 0), total);
        assert_eq!(phys.free_count(), total);
        assert_eq!(phys.domain(0).free_count(), total);
        assert_buddy_invariant(&phys, 0);
        assert_eq!(free_blocks(&phys, 0), [(16 * MIB, 9)]);
    }

    /// Dois domínios de 8 páginas: [16M] no domínio 0, [32M] no domínio 1
    #[cfg(feature = "numa")]
    fn two_domains() -> PhysAllocator {
        use super::super::{MemAffinity, SegmentRegistry};

        let mut reg = SegmentRegistry::new();
        reg.add_segment(PhysAddr::new(16 * MIB), PhysAddr::new(16 * MIB + 8 * PAGE_SIZE));
        reg.add_segment(PhysAddr::new(32 * MIB), PhysAddr::new(32 * MIB + 8 * PAGE_SIZE));
        reg.set_affinity(&[
            MemAffinity { start: PhysAddr::new(0), end: PhysAddr::new(24 * MIB), domain: 0 },
            MemAffinity { start: PhysAddr::new(24 * MIB), end: PhysAddr::new(64 * MIB), domain: 1 },
        ]);
        let phys = reg.initialize();
        phys.populate();
        phys
    }

    #[cfg(feature = "numa")]
    #[test]
    fn test_round_robin_and_domain_pinning() {
        let phys = two_domains();
        assert_eq!(phys.ndomains(), 2);

        let a = phys.alloc_pages(FreePool::Default, 0).unwrap();
        let b = phys.alloc_pages(FreePool::Default, 0).unwrap();
        assert_eq!(phys.page_domain(a).id(), 0);
        assert_eq!(phys.page_domain(b).id(), 1);

        let c = phys.alloc_pages_domain(1, FreePool::Default, 0).unwrap();
        assert_eq!(phys.page_domain(c).id(), 1);
        assert_eq!(phys.domain(0).free_count(), 7);
        assert_eq!(phys.domain(1).free_count(), 6);
        assert_eq!(phys.free_count(), 13);

        phys.free_pages(a, 0);
        phys.free_pages(b, 0);
        phys.free_pages(c, 0);
        assert_eq!(free_blocks(&phys, 0), [(16 * MIB, 3)]);
        assert_eq!(free_blocks(&phys, 1), [(32 * MIB, 3)]);
    }

    #[cfg(feature = "numa")]
    #[test]
    fn test_exhausted_domain_falls_through() {
        let phys = two_domains();

        let mut held = Vec::new();
        while let Some(m) = phys.alloc_pages_domain(0, FreePool::Default, 0) {
            assert_eq!(phys.page_domain(m).id(), 0);
            held.push(m);
        }
        assert_eq!(held.len(), 8);
        assert_eq!(phys.domain(0).free_count(), 0);
        assert!(phys.alloc_pages_domain(0, FreePool::Direct, 0).is_none());

        // Qualquer posição do cursor acaba no domínio 1
        for _ in 0..2 {
            let m = phys.alloc_pages(FreePool::Default, 0).unwrap();
            assert_eq!(phys.page_domain(m).id(), 1);
            phys.free_pages(m, 0);
        }

        let run = phys
            .alloc_contig(4, PhysAddr::new(0), PhysAddr::new(u64::MAX), 0, 0)
            .unwrap();
        assert_eq!(phys.page_domain(run).id(), 1);
        assert_eq!(phys.domain(1).free_count(), 4);
        assert!(phys
            .alloc_contig(5, PhysAddr::new(0), PhysAddr::new(u64::MAX), 0, 0)
            .is_none());

        phys.free_contig(run, 4);
        for m in held {
            phys.free_pages(m, 0);
        }
        for domain in 0..2 {
            assert_eq!(phys.domain(domain).free_count(), 8);
            assert_eq!(listed_free_pages(&phys, domain), 8);
            assert_buddy_invariant(&phys, domain);
        }
        assert_eq!(phys.free_count(), 16);
    }
}

//! # Contiguous Allocation
//!
//! Runs de N páginas fisicamente contíguas com restrições de endereço,
//! alinhamento e fronteira (DMA).
//!
//! ## Algoritmo
//!
//! 1. Candidato = primeiro endereço alinhado em `[low, high)` no segmento
//! 2. Se o run cruza a fronteira, pula para o início da próxima região
//! 3. Percorre o run bloco a bloco: ao achar página ocupada, recomeça no
//!    próximo endereço alinhado depois dela
//! 4. Run livre: remove cada bloco livre que o cobre e devolve as sobras
//!    (antes e depois do run) às free lists
//!
//! A realocação de páginas em uso não é feita aqui: `scan_contig` apenas
//! identifica candidatos cujas páginas estão livres ou são recuperáveis
//! segundo um `ContigReclaimer` externo.

use bitflags::bitflags;

use super::freelist::FreeQueues;
use super::{FreePool, PhysAllocator, Segment};
use crate::mm::addr::PhysAddr;
use crate::mm::config::PAGE_SIZE;
use crate::mm::page::{Page, PageId};

bitflags! {
    /// Opções de `scan_contig`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ScanFlags: u32 {
        /// Não considerar páginas de reservas
        const NORESERV = 1 << 0;
        /// Não considerar páginas de superpáginas
        const NOSUPER = 1 << 1;
    }
}

/// Colaborador de reclaim consultado por `scan_contig`
pub trait ContigReclaimer {
    /// A página em uso pode ser liberada ou realocada?
    fn is_reclaimable(&self, page: &Page, options: ScanFlags) -> bool;
}

/// Parâmetros normalizados de um pedido contíguo
#[derive(Clone, Copy)]
struct RunRequest {
    size: u64,
    low: PhysAddr,
    high: PhysAddr,
    align: u64,
    boundary: u64,
}

impl RunRequest {
    /// `None` se nenhum run pode satisfazer o pedido
    fn new(npages: usize, low: PhysAddr, high: PhysAddr, alignment: u64, boundary: u64) -> Option<Self> {
        assert!(
            alignment == 0 || alignment.is_power_of_two(),
            "(Phys) Alinhamento não é potência de 2"
        );
        assert!(
            boundary == 0 || boundary.is_power_of_two(),
            "(Phys) Fronteira não é potência de 2"
        );

        let size = (npages as u64).checked_mul(PAGE_SIZE)?;
        if npages == 0 || low >= high || (boundary != 0 && size > boundary) {
            return None;
        }
        Some(Self {
            size,
            low,
            high,
            align: alignment.max(PAGE_SIZE),
            boundary,
        })
    }

    #[inline]
    fn crosses_boundary(&self, pa: PhysAddr) -> bool {
        self.boundary != 0
            && (pa.as_u64() ^ (pa.as_u64() + self.size - 1)) & !(self.boundary - 1) != 0
    }
}

impl PhysAllocator {
    /// Aloca `npages` páginas contíguas com o run inteiro em `[low, high)`,
    /// início múltiplo de `alignment` e sem cruzar múltiplos de `boundary`.
    ///
    /// `alignment` e `boundary` em bytes (potências de 2); 0 significa
    /// alinhamento de página e sem fronteira. Domínios em round-robin,
    /// segmentos do mais alto para o mais baixo.
    pub fn alloc_contig(
        &self,
        npages: usize,
        low: PhysAddr,
        high: PhysAddr,
        alignment: u64,
        boundary: u64,
    ) -> Option<PageId> {
        let req = RunRequest::new(npages, low, high, alignment, boundary)?;

        let n = self.domains.len();
        let start = self.next_domain();
        for i in 0..n {
            let domain = (start + i) % n;
            let found = {
                let mut fq = self.domains[domain].free.lock();
                self.segs
                    .iter()
                    .rev()
                    .filter(|seg| seg.domain == domain)
                    .find_map(|seg| {
                        let pa = self.find_run(seg, &req, |q| self.free_extent(seg, q))?;
                        self.carve(&mut fq, seg, pa, req.size);
                        Some(seg.page_at(pa))
                    })
            };
            if let Some(m) = found {
                self.freecnt_adj(domain, -(npages as i64));
                return Some(m);
            }
        }

        crate::ktrace!("(Phys) alloc_contig sem run livre, npages=", npages);
        None
    }

    /// Libera um run de `npages` páginas começando em `m`.
    ///
    /// O run é decomposto em blocos naturalmente alinhados, cada um
    /// liberado com coalescência.
    pub fn free_contig(&self, m: PageId, npages: usize) {
        assert!(npages > 0, "(Phys) free_contig de zero páginas");
        let seg = self.segment_of(m);
        let pa = self.pages[m.index()].phys_addr();
        assert!(
            seg.contains_range(pa, npages as u64 * PAGE_SIZE),
            "(Phys) Run fora do segmento"
        );

        {
            let mut fq = self.domains[seg.domain].free.lock();
            self.free_range_locked(&mut fq, seg, pa, npages as u64);
        }
        self.freecnt_adj(seg.domain, npages as i64);
    }

    /// Procura um run cujas páginas estão livres ou são recuperáveis.
    ///
    /// Segmentos em ordem crescente de endereço. Nada é alterado: o chamador
    /// recupera as páginas e depois tenta `alloc_contig`.
    #[allow(clippy::too_many_arguments)]
    pub fn scan_contig(
        &self,
        npages: usize,
        low: PhysAddr,
        high: PhysAddr,
        alignment: u64,
        boundary: u64,
        options: ScanFlags,
        reclaimer: &dyn ContigReclaimer,
    ) -> Option<PageId> {
        let req = RunRequest::new(npages, low, high, alignment, boundary)?;

        for seg in self.segs.iter() {
            let _fq = self.domains[seg.domain].free.lock();
            let found = self.find_run(seg, &req, |q| {
                self.free_extent(seg, q).or_else(|| {
                    let page = &self.pages[seg.page_at(q).index()];
                    reclaimer
                        .is_reclaimable(page, options)
                        .then_some(q.add(PAGE_SIZE))
                })
            });
            if let Some(pa) = found {
                return Some(seg.page_at(pa));
            }
        }
        None
    }

    /// Fim do bloco livre que contém `q`, ou `None` se a página está ocupada
    #[inline]
    fn free_extent(&self, seg: &Segment, q: PhysAddr) -> Option<PhysAddr> {
        let (head, order) = self.containing_free_block(seg, q)?;
        Some(seg.page_addr(head).add(PAGE_SIZE << order))
    }

    /// Primeiro endereço do segmento onde cabe um run utilizável.
    ///
    /// `usable(q)` devolve até onde as páginas a partir de `q` são
    /// utilizáveis (exclusivo), ou `None` se `q` não é.
    fn find_run(
        &self,
        seg: &Segment,
        req: &RunRequest,
        usable: impl Fn(PhysAddr) -> Option<PhysAddr>,
    ) -> Option<PhysAddr> {
        let lo = seg.start.max(req.low);
        let hi = seg.end.min(req.high);
        if lo >= hi {
            return None;
        }

        let mut pa = lo.align_up(req.align);
        loop {
            let end = pa.as_u64().checked_add(req.size)?;
            if pa < lo || end > hi.as_u64() {
                return None;
            }
            if req.crosses_boundary(pa) {
                pa = PhysAddr::new(end - 1)
                    .align_down(req.boundary)
                    .align_up(req.align);
                continue;
            }

            let end = PhysAddr::new(end);
            let mut q = pa;
            while q < end {
                match usable(q) {
                    Some(next) => q = next,
                    None => break,
                }
            }
            if q >= end {
                return Some(pa);
            }
            pa = q.add(PAGE_SIZE).align_up(req.align);
        }
    }

    /// Retira das free lists o run `[pa, pa + size)` (todo livre).
    fn carve(&self, fq: &mut FreeQueues, seg: &Segment, pa: PhysAddr, size: u64) {
        let end = pa.add(size);
        let mut q = pa;
        while q < end {
            let Some((head, order)) = self.containing_free_block(seg, q) else {
                panic!("(Phys) carve: página do run não está livre");
            };
            let head_pa = seg.page_addr(head);
            let block_end = head_pa.add(PAGE_SIZE << order);
            let pool = self.pages[head.index()].pool();

            fq.remove(&self.pages, head, seg.freelist, order);
            if head_pa < pa {
                self.enqueue_range(fq, seg, head_pa, pa, pool);
            }
            if block_end > end {
                self.enqueue_range(fq, seg, end, block_end, pool);
            }
            q = block_end;
        }

        let first = seg.page_at(pa).index();
        for page in &self.pages[first..first + (size / PAGE_SIZE) as usize] {
            page.set_pool(FreePool::Default);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{assert_buddy_invariant, free_blocks, populated};
    use super::*;

    const BASE: u64 = 0x20_0000;

    fn page_addr(i: u64) -> PhysAddr {
        PhysAddr::new(BASE + i * PAGE_SIZE)
    }

    fn take(phys: &PhysAllocator, i: u64) {
        let id = phys.paddr_to_page(page_addr(i)).unwrap();
        assert!(phys.unfree_page(id));
    }

    fn anywhere() -> (PhysAddr, PhysAddr) {
        (PhysAddr::new(0), PhysAddr::new(u64::MAX))
    }

    #[test]
    fn test_exact_run_below_1mib() {
        let phys = populated(&[(0x8_0000, 0x8_4000)]);
        let m = phys
            .alloc_contig(4, PhysAddr::new(0), PhysAddr::new(1 << 20), 4, 0)
            .unwrap();
        assert_eq!(phys.page(m).phys_addr(), PhysAddr::new(0x8_0000));
        assert!(free_blocks(&phys, 0).is_empty());
        assert_eq!(phys.free_count(), 0);
    }

    #[test]
    fn test_no_run_leaves_lists_untouched() {
        let phys = populated(&[(BASE, BASE + 8 * PAGE_SIZE)]);
        take(&phys, 1);
        take(&phys, 5);
        let before = free_blocks(&phys, 0);

        let (low, high) = anywhere();
        assert!(phys.alloc_contig(4, low, high, 0, 0).is_none());
        assert_eq!(free_blocks(&phys, 0), before);
        assert_eq!(phys.free_count(), 8);
    }

    #[test]
    fn test_skips_busy_page() {
        let phys = populated(&[(BASE, BASE + 16 * PAGE_SIZE)]);
        take(&phys, 0);

        let (low, high) = anywhere();
        let m = phys.alloc_contig(3, low, high, 0, 0).unwrap();
        assert_eq!(phys.page(m).phys_addr(), page_addr(1));
        assert_eq!(free_blocks(&phys, 0), [(page_addr(4).as_u64(), 2), (page_addr(8).as_u64(), 3)]);
        assert_eq!(phys.free_count(), 13);

        phys.free_contig(m, 3);
        assert_buddy_invariant(&phys, 0);
        assert_eq!(phys.free_count(), 16);
    }

    #[test]
    fn test_carve_middle_and_merge_back() {
        let phys = populated(&[(BASE, BASE + 16 * PAGE_SIZE)]);
        let m = phys
            .alloc_contig(3, page_addr(5), PhysAddr::new(u64::MAX), 0, 0)
            .unwrap();
        assert_eq!(phys.page(m).phys_addr(), page_addr(5));
        assert_eq!(
            free_blocks(&phys, 0),
            [(BASE, 2), (page_addr(4).as_u64(), 0), (page_addr(8).as_u64(), 3)]
        );
        assert_buddy_invariant(&phys, 0);

        phys.free_contig(m, 3);
        assert_eq!(free_blocks(&phys, 0), [(BASE, 4)]);
    }

    #[test]
    fn test_boundary_and_alignment() {
        let phys = populated(&[(BASE, BASE + 16 * PAGE_SIZE)]);
        let high = PhysAddr::new(u64::MAX);

        // Run maior que a fronteira nunca cabe
        assert!(phys.alloc_contig(8, page_addr(0), high, 0, 4 * PAGE_SIZE).is_none());

        // Páginas 1..5 cruzariam a fronteira de 4 páginas
        let m = phys.alloc_contig(4, page_addr(1), high, 0, 4 * PAGE_SIZE).unwrap();
        assert_eq!(phys.page(m).phys_addr(), page_addr(4));

        take(&phys, 0);
        let a = phys.alloc_contig(2, page_addr(0), high, 8 * PAGE_SIZE, 0).unwrap();
        assert_eq!(phys.page(a).phys_addr(), page_addr(8));
    }

    #[test]
    fn test_high_limit_excludes_partial_run() {
        let phys = populated(&[(BASE, BASE + 16 * PAGE_SIZE)]);
        assert!(phys.alloc_contig(4, page_addr(0), page_addr(3), 0, 0).is_none());
        assert!(phys.alloc_contig(3, page_addr(0), page_addr(3), 0, 0).is_some());
    }

    struct Everything;
    impl ContigReclaimer for Everything {
        fn is_reclaimable(&self, _page: &Page, _options: ScanFlags) -> bool {
            true
        }
    }

    struct Nothing;
    impl ContigReclaimer for Nothing {
        fn is_reclaimable(&self, _page: &Page, _options: ScanFlags) -> bool {
            false
        }
    }

    #[test]
    fn test_scan_contig_consults_reclaimer() {
        let phys = populated(&[(BASE, BASE + 8 * PAGE_SIZE)]);
        let busy = phys.alloc_pages(FreePool::Default, 0).unwrap();
        assert_eq!(phys.page(busy).phys_addr(), page_addr(0));
        let before = free_blocks(&phys, 0);

        let (low, high) = anywhere();
        let found = phys
            .scan_contig(8, low, high, 0, 0, ScanFlags::empty(), &Everything)
            .unwrap();
        assert_eq!(found, busy);
        assert!(phys
            .scan_contig(8, low, high, 0, 0, ScanFlags::NORESERV, &Nothing)
            .is_none());

        // Só as 7 livres, sem a página ocupada
        let tail = phys
            .scan_contig(4, low, high, 0, 0, ScanFlags::empty(), &Nothing)
            .unwrap();
        assert_eq!(phys.page(tail).phys_addr(), page_addr(1));
        assert_eq!(free_blocks(&phys, 0), before);
    }
}

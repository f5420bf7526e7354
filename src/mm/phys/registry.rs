//! # Segment Registry
//!
//! Registro dos ranges de memória física durante o boot.
//!
//! O loader/firmware informa os ranges utilizáveis (`add_segment`) e,
//! opcionalmente, a tabela de afinidade NUMA (`set_affinity`) e a matriz de
//! distâncias (`set_locality`). `initialize` consome o registro e produz o
//! `PhysAllocator`; depois disso a topologia é imutável.
//!
//! Erros aqui são de configuração (firmware ou boot quebrado), não condições
//! de runtime: todos são fatais.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, AtomicUsize};

use spin::RwLock;

use super::domain::{Domain, NMARKERS};
use super::{FreeListKind, PhysAllocator, Segment};
use crate::counter::Counter;
use crate::mm::addr::PhysAddr;
use crate::mm::config::{
    DMA32_BOUNDARY, LOWMEM_BOUNDARY, MAXMEMDOM, OOM_SEQ_DEFAULT, PAGE_SIZE, PHYSSEG_MAX,
};
use crate::mm::page::{Page, PageId};

/// Entrada da tabela de afinidade: `[start, end)` pertence a `domain`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemAffinity {
    pub start: PhysAddr,
    pub end: PhysAddr,
    pub domain: usize,
}

/// Range de um único domínio, antes do corte por free list
struct Piece {
    start: PhysAddr,
    end: PhysAddr,
    domain: usize,
}

/// Registro de segmentos (fase de boot)
pub struct SegmentRegistry {
    /// Ranges registrados, ordenados e disjuntos
    ranges: Vec<(PhysAddr, PhysAddr)>,
    affinity: Vec<MemAffinity>,
    locality: Option<Vec<i32>>,
    oom_seq: u32,
}

impl SegmentRegistry {
    pub const fn new() -> Self {
        Self {
            ranges: Vec::new(),
            affinity: Vec::new(),
            locality: None,
            oom_seq: OOM_SEQ_DEFAULT,
        }
    }

    /// Registra o range físico `[start, end)`.
    ///
    /// # Panics
    /// Range não alinhado a página, vazio, sobreposto a outro ou acima do
    /// limite de segmentos.
    pub fn add_segment(&mut self, start: PhysAddr, end: PhysAddr) {
        assert!(
            start.is_page_aligned() && end.is_page_aligned(),
            "(Phys) Segmento não alinhado a página"
        );
        assert!(start < end, "(Phys) Segmento vazio ou invertido");
        assert!(
            self.ranges.len() < PHYSSEG_MAX,
            "(Phys) Segmentos demais, aumente PHYSSEG_MAX"
        );

        let idx = self.ranges.partition_point(|r| r.0 < start);
        let overlaps_prev = idx > 0 && self.ranges[idx - 1].1 > start;
        let overlaps_next = idx < self.ranges.len() && self.ranges[idx].0 < end;
        assert!(
            !overlaps_prev && !overlaps_next,
            "(Phys) Segmento sobrepõe um segmento existente"
        );

        self.ranges.insert(idx, (start, end));
        crate::ktrace!("(Phys) Segmento registrado em=", start.as_u64());
    }

    /// Tabela de afinidade (endereço → domínio), aplicada em `initialize`.
    ///
    /// Ignorada sem a feature `numa`.
    pub fn set_affinity(&mut self, table: &[MemAffinity]) {
        let mut table = table.to_vec();
        table.sort_unstable_by_key(|a| a.start);

        for (i, a) in table.iter().enumerate() {
            assert!(a.start < a.end, "(Phys) Entrada de afinidade vazia");
            assert!(a.domain < MAXMEMDOM, "(Phys) Domínio acima de MAXMEMDOM");
            if i > 0 {
                assert!(
                    table[i - 1].end <= a.start,
                    "(Phys) Entradas de afinidade sobrepostas"
                );
            }
        }
        self.affinity = table;
    }

    /// Matriz de distâncias `ndomains × ndomains` (linha = origem)
    pub fn set_locality(&mut self, matrix: &[i32]) {
        self.locality = Some(matrix.to_vec());
    }

    /// Passadas sem progresso antes de um domínio votar por OOM
    pub fn set_oom_seq(&mut self, seq: u32) {
        self.oom_seq = seq.max(1);
    }

    /// Corta `[start, end)` conforme a tabela de afinidade
    fn split_by_affinity(&self, start: PhysAddr, end: PhysAddr, out: &mut Vec<Piece>) {
        if !cfg!(feature = "numa") || self.affinity.is_empty() {
            out.push(Piece {
                start,
                end,
                domain: 0,
            });
            return;
        }

        let mut cursor = start;
        for a in &self.affinity {
            if cursor >= end {
                break;
            }
            if a.end <= cursor {
                continue;
            }
            if a.start > cursor {
                crate::kerror!("(Phys) Sem afinidade para o endereço=", cursor.as_u64());
                panic!("(Phys) Range sem informação de afinidade");
            }
            let piece_end = a.end.min(end);
            out.push(Piece {
                start: cursor,
                end: piece_end,
                domain: a.domain,
            });
            cursor = piece_end;
        }

        if cursor < end {
            crate::kerror!("(Phys) Sem afinidade para o endereço=", cursor.as_u64());
            panic!("(Phys) Range sem informação de afinidade");
        }
    }

    /// Consome o registro e constrói o alocador.
    ///
    /// Os descritores são criados fora das free lists: cada página só fica
    /// disponível depois de `add_page` (ou `populate`).
    ///
    /// # Panics
    /// Sem segmentos, range sem afinidade, domínios não densos, segmentos
    /// demais após os cortes ou matriz de localidade de tamanho errado.
    pub fn initialize(self) -> PhysAllocator {
        let Some(&(_, top)) = self.ranges.last() else {
            panic!("(Phys) Nenhum segmento registrado");
        };
        let dma32_used = top.as_u64() > DMA32_BOUNDARY;

        // 1. Afinidade
        let mut pieces = Vec::new();
        for &(start, end) in &self.ranges {
            self.split_by_affinity(start, end, &mut pieces);
        }

        // 2. Fronteiras das free lists
        let mut cuts = Vec::with_capacity(2);
        cuts.push(PhysAddr::new(LOWMEM_BOUNDARY));
        if dma32_used {
            cuts.push(PhysAddr::new(DMA32_BOUNDARY));
        }

        let mut segs: Vec<Segment> = Vec::new();
        for piece in &pieces {
            let mut start = piece.start;
            for &cut in cuts.iter().chain(core::iter::once(&piece.end)) {
                if cut <= start || cut > piece.end {
                    continue;
                }
                segs.push(Segment {
                    start,
                    end: cut,
                    domain: piece.domain,
                    first_page: PageId(0),
                    freelist: FreeListKind::for_segment_end(cut.as_u64(), dma32_used),
                });
                start = cut;
            }
        }
        assert!(
            segs.len() <= PHYSSEG_MAX,
            "(Phys) Segmentos demais após cortes, aumente PHYSSEG_MAX"
        );

        // 3. Domínios densos, começando em 0
        let ndomains = segs.iter().map(|s| s.domain).max().unwrap_or(0) + 1;
        for d in 0..ndomains {
            assert!(
                segs.iter().any(|s| s.domain == d),
                "(Phys) Domínios devem ser densos e começar em 0"
            );
        }
        if let Some(matrix) = &self.locality {
            assert_eq!(
                matrix.len(),
                ndomains * ndomains,
                "(Phys) Matriz de localidade com tamanho errado"
            );
        }

        // 4. Descritores: páginas de cada segmento, depois os marcadores
        let npages: usize = segs.iter().map(|s| s.npages()).sum();
        let total = npages + ndomains * NMARKERS;
        assert!(total < u32::MAX as usize, "(Phys) Descritores demais");

        let mut pages: Vec<Page> = Vec::with_capacity(total);
        for (segind, seg) in segs.iter_mut().enumerate() {
            seg.first_page = PageId(pages.len() as u32);
            for i in 0..seg.npages() as u64 {
                pages.push(Page::new(seg.start.add(i * PAGE_SIZE), segind as u16));
            }
            crate::kdebug!("(Phys) Segmento inicia em=", seg.start.as_u64());
            crate::kdebug!("(Phys)   páginas=", seg.npages());
        }
        for _ in 0..ndomains * NMARKERS {
            pages.push(Page::marker());
        }

        // 5. Domínios
        let domains: Vec<Domain> = (0..ndomains)
            .map(|d| {
                let mask = segs
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.domain == d)
                    .fold(0u64, |m, (i, _)| m | (1u64 << i));
                let markers = PageId((npages + d * NMARKERS) as u32);
                Domain::new(d, mask, &pages, markers)
            })
            .collect();

        crate::kinfo!("(Phys) Segmentos=", segs.len());
        crate::kinfo!("(Phys) Domínios=", ndomains);
        crate::kinfo!("(Phys) Descritores de página=", npages);

        PhysAllocator {
            pages: pages.into_boxed_slice(),
            nreal: npages,
            segs: segs.into_boxed_slice(),
            domains: domains.into_boxed_slice(),
            dma32_used,
            locality: self.locality.map(Vec::into_boxed_slice),
            free_count: Counter::new(),
            page_count: AtomicU64::new(0),
            next_domain: AtomicUsize::new(0),
            oom_votes: AtomicUsize::new(0),
            oom_seq_threshold: self.oom_seq,
            fictitious: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for SegmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

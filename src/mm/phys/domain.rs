//! # Domínio de Memória
//!
//! Agrupamento NUMA de memória física: free lists do buddy, filas de
//! páginas, contadores e estado de OOM.
//!
//! ## Locks
//!
//! - `free` protege toda a estrutura de free lists do domínio (split, merge,
//!   inserção, remoção).
//! - `free_count` NÃO é protegido por `free`: é um contador per-CPU ajustado
//!   fora do lock. Um leitor pode ver, por um instante, uma contagem que não
//!   bate com o conteúdo das listas.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use spin::Mutex;

use super::freelist::FreeQueues;
use crate::counter::Counter;
use crate::mm::page::{Page, PageId};
use crate::mm::pagequeue::{PageQueue, PageQueueKind, PQ_COUNT};

/// Marcadores por domínio (marker, laundry_marker, inacthead)
pub(crate) const NMARKERS: usize = 3;

/// Domínio NUMA
pub struct Domain {
    id: usize,
    pub(crate) free: Mutex<FreeQueues>,
    pagequeues: [PageQueue; PQ_COUNT],
    free_count: Counter,
    page_count: AtomicU64,
    /// Máscara dos segmentos do domínio
    segs: u64,
    oom: AtomicBool,
    oom_seq: AtomicU32,
    /// Marcador de uso privado do pagedaemon
    marker: PageId,
    laundry_marker: PageId,
    /// Marcador para inserções que evitam o LRU (fixo na fila inativa)
    inacthead: PageId,
}

impl Domain {
    /// `markers` é o primeiro dos `NMARKERS` descritores de marcador do domínio
    pub(crate) fn new(id: usize, segs: u64, pages: &[Page], markers: PageId) -> Self {
        let inacthead = markers.offset(2);
        Self {
            id,
            free: Mutex::new(FreeQueues::new()),
            pagequeues: [
                PageQueue::new(id, PageQueueKind::Inactive).with_head_marker(pages, inacthead),
                PageQueue::new(id, PageQueueKind::Active),
                PageQueue::new(id, PageQueueKind::Laundry),
            ],
            free_count: Counter::new(),
            page_count: AtomicU64::new(0),
            segs,
            oom: AtomicBool::new(false),
            oom_seq: AtomicU32::new(0),
            marker: markers,
            laundry_marker: markers.offset(1),
            inacthead,
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Páginas livres (aproximado, nunca negativo)
    #[inline]
    pub fn free_count(&self) -> u64 {
        self.free_count.fetch_i64().max(0) as u64
    }

    #[inline]
    pub(crate) fn freecnt_add(&self, adj: i64) {
        self.free_count.add(adj);
    }

    /// Páginas adicionadas ao domínio
    #[inline]
    pub fn page_count(&self) -> u64 {
        self.page_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn page_count_add(&self, n: u64) {
        self.page_count.fetch_add(n, Ordering::Relaxed);
    }

    /// Máscara de segmentos
    #[inline]
    pub fn segs(&self) -> u64 {
        self.segs
    }

    #[inline]
    pub fn pagequeue(&self, kind: PageQueueKind) -> &PageQueue {
        &self.pagequeues[kind as usize]
    }

    #[inline]
    pub fn marker(&self) -> PageId {
        self.marker
    }

    #[inline]
    pub fn laundry_marker(&self) -> PageId {
        self.laundry_marker
    }

    #[inline]
    pub fn inacthead(&self) -> PageId {
        self.inacthead
    }

    #[inline]
    pub fn is_oom(&self) -> bool {
        self.oom.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn oom_seq(&self) -> u32 {
        self.oom_seq.load(Ordering::Relaxed)
    }

    /// Registra o resultado de uma passada do pagedaemon deste domínio.
    ///
    /// `votes` é o total de domínios votando por OOM. Retorna true apenas
    /// para o domínio que completa o quorum; esse domínio já retira o voto
    /// de volta (uma rodada de OOM por quorum).
    pub(crate) fn oom_vote(
        &self,
        starting_shortage: i64,
        shortage: i64,
        threshold: u32,
        votes: &AtomicUsize,
        ndomains: usize,
    ) -> bool {
        if starting_shortage <= 0 || starting_shortage != shortage {
            self.oom_seq.store(0, Ordering::Relaxed);
        } else {
            self.oom_seq.fetch_add(1, Ordering::Relaxed);
        }

        if self.oom_seq.load(Ordering::Relaxed) < threshold {
            if self.oom.swap(false, Ordering::Relaxed) {
                votes.fetch_sub(1, Ordering::AcqRel);
            }
            return false;
        }

        // Não seguir a sequência até a condição de OOM ser resolvida
        self.oom_seq.store(0, Ordering::Relaxed);
        if self.oom.swap(true, Ordering::Relaxed) {
            return false;
        }

        let old_vote = votes.fetch_add(1, Ordering::AcqRel);
        crate::kwarn!("(Phys) Domínio votou por OOM, id=", self.id);
        if old_vote != ndomains - 1 {
            return false;
        }

        crate::kerror!("(Phys) Quorum de OOM atingido pelo domínio=", self.id);
        self.oom.store(false, Ordering::Relaxed);
        votes.fetch_sub(1, Ordering::AcqRel);
        true
    }
}

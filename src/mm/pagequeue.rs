//! # Page Queues
//!
//! Filas nomeadas de páginas por domínio, consumidas pelo subsistema de
//! reclaim (externo a este crate).
//!
//! Cada fila tem um mutex próprio que protege o encadeamento e a contagem
//! autoritativa. A contagem é espelhada em um `Counter` per-CPU para leitura
//! sem lock por consumidores de estatística.
//!
//! Marcadores (`PageFlags::MARKER`) podem ser inseridos para que um scanner
//! incremental retome a varredura sem segurar o mutex a passada inteira.
//! Marcadores não entram na contagem.

use spin::{Mutex, MutexGuard};

use crate::counter::Counter;
use crate::klib::list::IndexList;
use crate::mm::page::{Page, PageId};

/// Número de filas por domínio
pub const PQ_COUNT: usize = 3;

/// Filas de um domínio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageQueueKind {
    Inactive = 0,
    Active = 1,
    Laundry = 2,
}

impl PageQueueKind {
    pub const ALL: [Self; PQ_COUNT] = [Self::Inactive, Self::Active, Self::Laundry];

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Inactive => "vm inactive pagequeue",
            Self::Active => "vm active pagequeue",
            Self::Laundry => "vm laundry pagequeue",
        }
    }
}

struct QueueInner {
    list: IndexList,
    cnt: usize,
}

/// Fila de páginas
///
/// Alinhada a cache line: as filas de um domínio são vizinhas em memória e
/// travadas por CPUs diferentes.
#[repr(C, align(64))]
pub struct PageQueue {
    /// Domínio dono da fila
    domain: usize,
    kind: PageQueueKind,
    inner: Mutex<QueueInner>,
    vcnt: Counter,
    /// Marcador de inserção "sem reuso" (apenas na fila inativa)
    head_marker: Option<PageId>,
}

impl PageQueue {
    pub(crate) fn new(domain: usize, kind: PageQueueKind) -> Self {
        Self {
            domain,
            kind,
            inner: Mutex::new(QueueInner {
                list: IndexList::new(),
                cnt: 0,
            }),
            vcnt: Counter::new(),
            head_marker: None,
        }
    }

    /// Instala `marker` como âncora permanente na cabeça da fila
    pub(crate) fn with_head_marker(mut self, pages: &[Page], marker: PageId) -> Self {
        self.inner.get_mut().list.push_front(pages, marker.0);
        pages[marker.index()].set_queue(Some(self.owner()));
        self.head_marker = Some(marker);
        self
    }

    #[inline]
    pub fn kind(&self) -> PageQueueKind {
        self.kind
    }

    #[inline]
    pub fn domain(&self) -> usize {
        self.domain
    }

    #[inline]
    fn owner(&self) -> (usize, PageQueueKind) {
        (self.domain, self.kind)
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Contagem aproximada, sem lock
    #[inline]
    pub fn approx_count(&self) -> u64 {
        self.vcnt.fetch()
    }

    /// Adquire o lock da fila. `pages` é o array de descritores do alocador.
    pub fn lock<'a>(&'a self, pages: &'a [Page]) -> PageQueueGuard<'a> {
        PageQueueGuard {
            queue: self,
            pages,
            inner: self.inner.lock(),
        }
    }
}

/// Fila travada
pub struct PageQueueGuard<'a> {
    queue: &'a PageQueue,
    pages: &'a [Page],
    inner: MutexGuard<'a, QueueInner>,
}

impl PageQueueGuard<'_> {
    /// Contagem autoritativa (sem marcadores)
    #[inline]
    pub fn count(&self) -> usize {
        self.inner.cnt
    }

    fn cnt_add(&mut self, id: PageId, addend: isize) {
        if self.pages[id.index()].is_marker() {
            return;
        }
        self.inner.cnt = self.inner.cnt.wrapping_add_signed(addend);
        self.queue.vcnt.add(addend as i64);
    }

    fn claim(&self, id: PageId) {
        let page = &self.pages[id.index()];
        assert!(
            page.queue().is_none(),
            "(PageQueue) Página já está em uma fila"
        );
        assert!(
            page.free_order().is_none(),
            "(PageQueue) Página livre no buddy"
        );
        page.set_queue(Some(self.queue.owner()));
    }

    /// Insere no final da fila
    pub fn enqueue(&mut self, id: PageId) {
        self.claim(id);
        self.inner.list.push_back(self.pages, id.0);
        self.cnt_add(id, 1);
    }

    /// Insere na cabeça da fila (logo antes do marcador de cabeça, se houver)
    pub fn enqueue_head(&mut self, id: PageId) {
        self.claim(id);
        match self.queue.head_marker {
            Some(marker) => self.inner.list.insert_before(self.pages, marker.0, id.0),
            None => self.inner.list.push_front(self.pages, id.0),
        }
        self.cnt_add(id, 1);
    }

    /// Insere `id` logo após `anchor` (página ou marcador desta fila)
    pub fn insert_after(&mut self, anchor: PageId, id: PageId) {
        debug_assert_eq!(self.pages[anchor.index()].queue_owner(), Some(self.queue.owner()));
        self.claim(id);
        self.inner.list.insert_after(self.pages, anchor.0, id.0);
        self.cnt_add(id, 1);
    }

    /// Remove `id` da fila
    pub fn remove(&mut self, id: PageId) {
        let page = &self.pages[id.index()];
        assert_eq!(
            page.queue_owner(),
            Some(self.queue.owner()),
            "(PageQueue) Página não pertence a esta fila"
        );
        self.inner.list.remove(self.pages, id.0);
        page.set_queue(None);
        self.cnt_add(id, -1);
    }

    /// Remove a primeira página real (marcadores são pulados)
    pub fn dequeue(&mut self) -> Option<PageId> {
        let id = self
            .inner
            .list
            .iter(self.pages)
            .find(|&id| !self.pages[id as usize].is_marker())?;
        let id = PageId(id);
        self.remove(id);
        Some(id)
    }

    /// Primeiro elemento (página ou marcador)
    pub fn first(&self) -> Option<PageId> {
        self.inner.list.first().map(PageId)
    }

    /// Sucessor de `id` (página ou marcador)
    pub fn next(&self, id: PageId) -> Option<PageId> {
        self.inner.list.next(self.pages, id.0).map(PageId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::addr::PhysAddr;
    use crate::mm::config::PAGE_SIZE;
    use alloc::vec::Vec;

    fn arena() -> Vec<Page> {
        let mut pages: Vec<Page> = (0..4)
            .map(|i| Page::new(PhysAddr::new(i * PAGE_SIZE), 0))
            .collect();
        pages.push(Page::marker());
        pages.push(Page::marker());
        pages
    }

    #[test]
    fn test_counts_skip_markers() {
        let pages = arena();
        let pq = PageQueue::new(0, PageQueueKind::Active);
        let mut q = pq.lock(&pages);

        q.enqueue(PageId(0));
        q.enqueue(PageId(1));
        q.insert_after(PageId(0), PageId(4));
        assert_eq!(q.count(), 2);
        assert_eq!(pages[4].queue(), Some(PageQueueKind::Active));

        // Scanner retoma a partir do marcador
        assert_eq!(q.next(PageId(4)), Some(PageId(1)));
        q.remove(PageId(4));
        assert_eq!(q.count(), 2);
        drop(q);
        assert_eq!(pq.approx_count(), 2);
    }

    #[test]
    fn test_dequeue_skips_head_marker() {
        let pages = arena();
        let pq = PageQueue::new(0, PageQueueKind::Inactive).with_head_marker(&pages, PageId(5));
        let mut q = pq.lock(&pages);

        q.enqueue(PageId(2));
        q.enqueue_head(PageId(3));
        assert_eq!(q.first(), Some(PageId(3)));
        assert_eq!(q.next(PageId(3)), Some(PageId(5)));

        assert_eq!(q.dequeue(), Some(PageId(3)));
        assert_eq!(q.dequeue(), Some(PageId(2)));
        assert_eq!(q.dequeue(), None);
        assert_eq!(q.count(), 0);
        assert_eq!(q.first(), Some(PageId(5)));
        assert_eq!(pages[3].queue(), None);
    }

    #[test]
    #[should_panic(expected = "livre no buddy")]
    fn test_enqueue_of_free_block_head_panics() {
        let pages = arena();
        pages[1].set_free_order(Some(0));
        let pq = PageQueue::new(0, PageQueueKind::Active);
        pq.lock(&pages).enqueue(PageId(1));
    }

    #[test]
    #[should_panic(expected = "não pertence")]
    fn test_remove_from_other_domain_queue_panics() {
        let pages = arena();
        let local = PageQueue::new(0, PageQueueKind::Active);
        let remote = PageQueue::new(1, PageQueueKind::Active);
        local.lock(&pages).enqueue(PageId(0));
        remote.lock(&pages).remove(PageId(0));
    }

    #[test]
    #[should_panic]
    fn test_double_enqueue_panics() {
        let pages = arena();
        let pq = PageQueue::new(0, PageQueueKind::Laundry);
        let mut q = pq.lock(&pages);
        q.enqueue(PageId(0));
        q.enqueue(PageId(0));
    }
}

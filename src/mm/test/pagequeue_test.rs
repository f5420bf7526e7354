//! Testes das filas de páginas por domínio

use crate::klib::test_framework::{TestCase, TestResult};
use crate::mm::addr::PhysAddr;
use crate::mm::config::PAGE_SIZE;
use crate::mm::pagequeue::PageQueueKind;
use crate::mm::phys::{FreePool, SegmentRegistry};

/// Testes das filas
pub const PAGEQUEUE_TESTS: &[TestCase] = &[
    TestCase::new("pagequeue_fifo", test_fifo),
    TestCase::new("pagequeue_inacthead", test_inacthead),
];

/// Teste: enqueue/dequeue em ordem FIFO com contagem
fn test_fifo() -> TestResult {
    let mut reg = SegmentRegistry::new();
    reg.add_segment(PhysAddr::new(0x100_0000), PhysAddr::new(0x100_0000 + 8 * PAGE_SIZE));
    let phys = reg.initialize();
    phys.populate();

    let (Some(a), Some(b)) = (
        phys.alloc_pages(FreePool::Default, 0),
        phys.alloc_pages(FreePool::Default, 0),
    ) else {
        return TestResult::Fail;
    };

    let queue = phys.domain(0).pagequeue(PageQueueKind::Active);
    {
        let mut q = queue.lock(phys.pages());
        q.enqueue(a);
        q.enqueue(b);
        if q.count() != 2 {
            return TestResult::Fail;
        }
        if q.dequeue() != Some(a) || q.dequeue() != Some(b) || q.dequeue().is_some() {
            crate::kerror!("(PageQueue) Ordem FIFO violada");
            return TestResult::Fail;
        }
    }
    if queue.approx_count() != 0 {
        return TestResult::Fail;
    }
    TestResult::Pass
}

/// Teste: enqueue_head insere antes do marcador de cabeça da Inactive
fn test_inacthead() -> TestResult {
    let mut reg = SegmentRegistry::new();
    reg.add_segment(PhysAddr::new(0x100_0000), PhysAddr::new(0x100_0000 + 4 * PAGE_SIZE));
    let phys = reg.initialize();
    phys.populate();

    let Some(m) = phys.alloc_pages(FreePool::Default, 0) else {
        return TestResult::Fail;
    };
    let dom = phys.domain(0);
    let mut q = dom.pagequeue(PageQueueKind::Inactive).lock(phys.pages());
    q.enqueue_head(m);

    if q.first() != Some(m) || q.next(m) != Some(dom.inacthead()) || q.count() != 1 {
        crate::kerror!("(PageQueue) Página fora da posição do marcador");
        return TestResult::Fail;
    }
    q.remove(m);
    TestResult::Pass
}

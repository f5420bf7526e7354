//! # Testes do Subsistema de Memória
//!
//! Suite de self-test do kernel, executada no boot com a feature
//! `self_test`. Cada caso monta seu próprio alocador pequeno, portanto a
//! suite não toca o alocador global.
//!
//! - `phys_test.rs` - buddy, runs contíguos, páginas fictícias
//! - `pagequeue_test.rs` - filas e marcadores

pub mod pagequeue_test;

use crate::klib::test_framework::{run_test_suite, SuiteReport};

/// Executa todos os testes de memória física
pub fn run_phys_tests() -> SuiteReport {
    let phys = run_test_suite("phys", phys_test::PHYS_TESTS);
    let queues = run_test_suite("pagequeue", pagequeue_test::PAGEQUEUE_TESTS);

    SuiteReport {
        passed: phys.passed + queues.passed,
        failed: phys.failed + queues.failed,
        skipped: phys.skipped + queues.skipped,
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_self_test_suite_passes() {
        let report = super::run_phys_tests();
        assert_eq!(report.failed, 0);
        assert!(report.passed > 0);
    }
}

//! Kernel Library (KLib).
//!
//! Utilitários agnósticos de hardware para uso interno do alocador.
//! Funciona como uma extensão da `core` library.

pub mod list;
pub mod logging;
pub mod test_framework;

/// Alinha um valor para cima ao próximo múltiplo de `align` (potência de 2).
///
/// # Exemplo
/// `align_up(10, 4) -> 12`
#[inline(always)]
pub const fn align_up(val: u64, align: u64) -> u64 {
    (val + align - 1) & !(align - 1)
}

/// Alinha um valor para baixo ao múltiplo anterior de `align`.
///
/// # Exemplo
/// `align_down(10, 4) -> 8`
#[inline(always)]
pub const fn align_down(val: u64, align: u64) -> u64 {
    val & !(align - 1)
}

/// Verifica se um valor está alinhado a `align`.
#[inline(always)]
pub const fn is_aligned(val: u64, align: u64) -> bool {
    val & (align - 1) == 0
}

use crate::klib::{align_down, align_up, is_aligned};
use crate::mm::config::{PAGE_SHIFT, PAGE_SIZE};
use core::fmt;

/// Endereço físico (wrapper type-safe)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct PhysAddr(u64);

impl PhysAddr {
    /// Cria novo endereço físico
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Retorna o valor interno como u64
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Número do frame (endereço >> PAGE_SHIFT)
    #[inline]
    pub const fn pfn(self) -> u64 {
        self.0 >> PAGE_SHIFT
    }

    /// Alinha para baixo (múltiplo de align)
    #[inline]
    pub const fn align_down(self, align: u64) -> Self {
        Self(align_down(self.0, align))
    }

    /// Alinha para cima (múltiplo de align)
    #[inline]
    pub const fn align_up(self, align: u64) -> Self {
        Self(align_up(self.0, align))
    }

    /// Verifica alinhamento
    #[inline]
    pub const fn is_aligned(self, align: u64) -> bool {
        is_aligned(self.0, align)
    }

    /// Verifica alinhamento a página
    #[inline]
    pub const fn is_page_aligned(self) -> bool {
        is_aligned(self.0, PAGE_SIZE)
    }

    /// Adiciona offset
    #[inline]
    pub const fn add(self, offset: u64) -> Self {
        Self(self.0 + offset)
    }

    /// Distância em bytes a partir de `base` (`base <= self`)
    #[inline]
    pub const fn offset_from(self, base: PhysAddr) -> u64 {
        self.0 - base.0
    }

    /// Endereço do buddy de um bloco de `order` páginas (XOR no bit da ordem)
    #[inline]
    pub const fn buddy(self, order: usize) -> Self {
        Self(self.0 ^ (PAGE_SIZE << order))
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#x})", self.0)
    }
}

impl fmt::LowerHex for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

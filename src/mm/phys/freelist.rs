//! # Free Lists
//!
//! Classificação dos blocos livres de um domínio.
//!
//! ## 🏗️ Arquitetura
//!
//! Cada domínio mantém uma lista por `(freelist, pool, ordem)`:
//!
//! - **FreeListKind**: classe de endereço. Dispositivos com endereçamento
//!   limitado precisam de memória baixa.
//!   - `LowMem` (0-16MB): dispositivos ISA legados (24 bits)
//!   - `Dma32` (16MB-4GB): dispositivos PCI de 32 bits
//!   - `Default`: o resto
//! - **FreePool**: intenção de uso (independente do domínio)
//! - **Ordem**: log2 do tamanho do bloco em páginas
//!
//! Pedido genérico tenta Default → Dma32 → LowMem (fallback), preservando a
//! memória baixa para quem realmente precisa dela.

use crate::klib::list::IndexList;
use crate::mm::config::{DMA32_BOUNDARY, LOWMEM_BOUNDARY, NFREELIST, NFREEORDER, NFREEPOOL};
use crate::mm::page::{Page, PageId};

// =============================================================================
// POOLS
// =============================================================================

/// Pool de uso de um bloco
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FreePool {
    /// Uso geral
    Default = 0,
    /// Páginas acessadas direto pelo kernel (tabelas de página, UMA)
    Direct = 1,
}

impl FreePool {
    pub const ALL: [Self; NFREEPOOL] = [Self::Default, Self::Direct];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub(crate) fn from_index(idx: usize) -> Self {
        match idx {
            1 => Self::Direct,
            _ => Self::Default,
        }
    }
}

// =============================================================================
// CLASSES DE ENDEREÇO
// =============================================================================

/// Free list (classe de endereço) de um segmento
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum FreeListKind {
    /// Memória geral
    Default = 0,
    /// Abaixo de 4 GB (usada apenas se existe memória acima de 4 GB)
    Dma32 = 1,
    /// Abaixo de 16 MB
    LowMem = 2,
}

impl FreeListKind {
    /// Ordem de fallback de um pedido genérico
    pub const ALL: [Self; NFREELIST] = [Self::Default, Self::Dma32, Self::LowMem];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Limite superior (exclusivo)
    pub fn upper_limit(&self) -> u64 {
        match self {
            Self::LowMem => LOWMEM_BOUNDARY,
            Self::Dma32 => DMA32_BOUNDARY,
            Self::Default => u64::MAX,
        }
    }

    /// Classe de um segmento que termina em `end` (exclusivo).
    ///
    /// Segmentos são cortados nas fronteiras antes desta consulta, portanto
    /// o fim decide sozinho.
    pub fn for_segment_end(end: u64, dma32_used: bool) -> Self {
        if end <= LOWMEM_BOUNDARY {
            Self::LowMem
        } else if dma32_used && end <= DMA32_BOUNDARY {
            Self::Dma32
        } else {
            Self::Default
        }
    }
}

// =============================================================================
// FILAS LIVRES DE UM DOMÍNIO
// =============================================================================

const EMPTY: IndexList = IndexList::new();
const ORDERS: [IndexList; NFREEORDER] = [EMPTY; NFREEORDER];
const POOLS: [[IndexList; NFREEORDER]; NFREEPOOL] = [ORDERS; NFREEPOOL];

/// Todas as listas livres de um domínio, protegidas pelo lock do domínio
pub(crate) struct FreeQueues {
    lists: [[[IndexList; NFREEORDER]; NFREEPOOL]; NFREELIST],
}

impl FreeQueues {
    pub(crate) const fn new() -> Self {
        Self {
            lists: [POOLS; NFREELIST],
        }
    }

    #[inline]
    pub(crate) fn list(&self, fl: FreeListKind, pool: FreePool, order: usize) -> &IndexList {
        &self.lists[fl.index()][pool.index()][order]
    }

    /// Insere bloco livre de `order` páginas com cabeça `id`.
    ///
    /// `tail`: blocos resultantes de split vão para o fim, blocos liberados
    /// para o início (reuso quente).
    pub(crate) fn add(
        &mut self,
        pages: &[Page],
        id: PageId,
        fl: FreeListKind,
        order: usize,
        tail: bool,
    ) {
        let page = &pages[id.index()];
        let list = &mut self.lists[fl.index()][page.pool().index()][order];
        page.set_free_order(Some(order));
        if tail {
            list.push_back(pages, id.0);
        } else {
            list.push_front(pages, id.0);
        }
    }

    /// Remove bloco livre de `order` páginas com cabeça `id`
    pub(crate) fn remove(&mut self, pages: &[Page], id: PageId, fl: FreeListKind, order: usize) {
        let page = &pages[id.index()];
        debug_assert_eq!(page.free_order(), Some(order));
        self.lists[fl.index()][page.pool().index()][order].remove(pages, id.0);
        page.set_free_order(None);
    }

    /// Primeiro bloco livre de uma lista
    #[inline]
    pub(crate) fn first(&self, fl: FreeListKind, pool: FreePool, order: usize) -> Option<PageId> {
        self.list(fl, pool, order).first().map(PageId)
    }

    /// Número de blocos de uma lista
    #[inline]
    pub(crate) fn count(&self, fl: FreeListKind, pool: FreePool, order: usize) -> usize {
        self.list(fl, pool, order).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_classification() {
        assert_eq!(FreeListKind::for_segment_end(LOWMEM_BOUNDARY, true), FreeListKind::LowMem);
        assert_eq!(FreeListKind::for_segment_end(DMA32_BOUNDARY, true), FreeListKind::Dma32);
        assert_eq!(FreeListKind::for_segment_end(DMA32_BOUNDARY, false), FreeListKind::Default);
        assert_eq!(FreeListKind::for_segment_end(DMA32_BOUNDARY + 1, true), FreeListKind::Default);
    }

    #[test]
    fn test_pool_roundtrip() {
        for pool in FreePool::ALL {
            assert_eq!(FreePool::from_index(pool.index()), pool);
        }
    }
}

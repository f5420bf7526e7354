//! # Fictitious Pages
//!
//! Ranges físicos registrados externamente (memória de dispositivo, BARs)
//! que não pertencem a nenhum segmento. Cada range ganha um array próprio de
//! descritores sintetizados, marcados com `PageFlags::FICTITIOUS` e com o
//! atributo de memória do registro.
//!
//! Os ranges ficam num `BTreeMap` indexado pelo início, protegido por
//! `RwLock`: consultas são frequentes, registros raros.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ops::Deref;

use super::PhysAllocator;
use crate::mm::addr::PhysAddr;
use crate::mm::config::PAGE_SIZE;
use crate::mm::error::{MmError, MmResult};
use crate::mm::page::{MemAttr, Page};

/// Range fictício registrado
pub struct FictitiousRange {
    start: PhysAddr,
    end: PhysAddr,
    memattr: MemAttr,
    pages: Box<[Page]>,
}

impl FictitiousRange {
    #[inline]
    pub fn start(&self) -> PhysAddr {
        self.start
    }

    #[inline]
    pub fn end(&self) -> PhysAddr {
        self.end
    }

    #[inline]
    pub fn memattr(&self) -> MemAttr {
        self.memattr
    }

    #[inline]
    pub fn npages(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    fn contains(&self, pa: PhysAddr) -> bool {
        pa >= self.start && pa < self.end
    }
}

impl core::fmt::Debug for FictitiousRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FictitiousRange")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("memattr", &self.memattr)
            .finish()
    }
}

/// Descritor de uma página fictícia.
///
/// Mantém o range vivo: o descritor continua válido mesmo depois de
/// `unreg_fictitious_range`.
#[derive(Clone)]
pub struct FictitiousPage {
    range: Arc<FictitiousRange>,
    index: usize,
}

impl FictitiousPage {
    #[inline]
    pub fn range(&self) -> &FictitiousRange {
        &self.range
    }
}

impl Deref for FictitiousPage {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.range.pages[self.index]
    }
}

impl core::fmt::Debug for FictitiousPage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&**self, f)
    }
}

impl PhysAllocator {
    /// Registra `[start, end)` como range fictício com atributo `memattr`.
    ///
    /// # Erros
    /// - `NotAligned`: limites fora do alinhamento de página
    /// - `InvalidSize`: range vazio ou invertido
    /// - `AlreadyMapped`: sobrepõe um segmento real ou outro range fictício
    /// - `OutOfMemory`: sem memória para os descritores
    pub fn reg_fictitious_range(
        &self,
        start: PhysAddr,
        end: PhysAddr,
        memattr: MemAttr,
    ) -> MmResult<()> {
        if !start.is_page_aligned() || !end.is_page_aligned() {
            return Err(MmError::NotAligned);
        }
        if start >= end {
            return Err(MmError::InvalidSize);
        }
        if self.segs.iter().any(|s| s.start < end && s.end > start) {
            crate::kwarn!("(Phys) Range fictício sobrepõe segmento real=", start.as_u64());
            return Err(MmError::AlreadyMapped);
        }

        let npages = (end.offset_from(start) / PAGE_SIZE) as usize;
        let mut pages = Vec::new();
        pages
            .try_reserve_exact(npages)
            .map_err(|_| MmError::OutOfMemory)?;
        pages.extend((0..npages as u64).map(|i| Page::fictitious(start.add(i * PAGE_SIZE), memattr)));

        let range = Arc::new(FictitiousRange {
            start,
            end,
            memattr,
            pages: pages.into_boxed_slice(),
        });

        let mut ranges = self.fictitious.write();
        if let Some((_, prev)) = ranges.range(..end.as_u64()).next_back() {
            if prev.end > start {
                crate::kwarn!("(Phys) Range fictício já registrado=", prev.start.as_u64());
                return Err(MmError::AlreadyMapped);
            }
        }
        ranges.insert(start.as_u64(), range);

        crate::kinfo!("(Phys) Range fictício registrado=", start.as_u64());
        Ok(())
    }

    /// Remove o registro `[start, end)`.
    ///
    /// # Panics
    /// Se não existe registro exatamente com esses limites.
    pub fn unreg_fictitious_range(&self, start: PhysAddr, end: PhysAddr) {
        let mut ranges = self.fictitious.write();
        match ranges.get(&start.as_u64()) {
            Some(r) if r.end == end => {
                ranges.remove(&start.as_u64());
            }
            _ => {
                crate::kerror!("(Phys) Range fictício desconhecido=", start.as_u64());
                panic!("(Phys) unreg_fictitious_range: range não registrado");
            }
        }
        crate::kinfo!("(Phys) Range fictício removido=", start.as_u64());
    }

    /// Descritor fictício da página em `pa`
    pub fn fictitious_to_page(&self, pa: PhysAddr) -> Option<FictitiousPage> {
        let ranges = self.fictitious.read();
        let (_, range) = ranges.range(..=pa.as_u64()).next_back()?;
        if !range.contains(pa) {
            return None;
        }
        Some(FictitiousPage {
            range: Arc::clone(range),
            index: (pa.offset_from(range.start) / PAGE_SIZE) as usize,
        })
    }
}

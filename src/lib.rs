//! Forge PhysMem.
//!
//! Alocador de páginas físicas do Forge Kernel e as primitivas de contagem
//! per-CPU das quais ele depende.
//!
//! ```text
//! counter  ──▶ contador escalável, ratecheck, quota com orçamento por CPU
//!  │
//!  ▼
//! mm::phys ──▶ registro de segmentos → buddy por domínio/pool/ordem
//!  │
//!  ▼
//! mm::pagequeue ──▶ filas nomeadas por domínio (active/inactive/laundry)
//! ```

#![no_std]

// Habilitar alocação dinâmica (Vec/Box/Arc para arrays de descritores)
extern crate alloc;

#[cfg(test)]
extern crate std;

// --- Módulos de Baixo Nível ---
pub mod hal; // Plataforma (CPU atual, ticks, bloqueio, console)
pub mod klib; // Utilitários internos (logs, listas por índice, alinhamento)
pub mod sync; // CondVar sobre spin::Mutex

// --- Subsistemas ---
pub mod counter; // Contadores per-CPU
pub mod mm; // Alocador físico e filas de páginas

pub use counter::{AllocWait, Counter};
pub use mm::phys::{PhysAllocator, SegmentRegistry};

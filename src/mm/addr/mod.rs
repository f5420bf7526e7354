//! # Addr - Wrapper Type-Safe para Endereços Físicos
//!
//! Evita confundir endereço físico com índice de página ou contagem.

mod phys;

pub use phys::PhysAddr;

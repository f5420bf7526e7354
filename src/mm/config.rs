//! # Configuração do Módulo de Memória
//!
//! Define constantes e limites do alocador físico e dos contadores per-CPU.

// =============================================================================
// CONSTANTES DE TAMANHO
// =============================================================================

/// Bits de offset dentro de uma página
pub const PAGE_SHIFT: u32 = 12;

/// Tamanho de uma página (4 KiB)
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

// =============================================================================
// CONFIGURAÇÃO DO BUDDY
// =============================================================================

/// Número de ordens do buddy (0..=12, bloco máximo de 16 MiB)
pub const NFREEORDER: usize = 13;

/// Número de pools de uso (Default, Direct)
pub const NFREEPOOL: usize = 2;

/// Número de free lists por classe de endereço (Default, Dma32, LowMem)
pub const NFREELIST: usize = 3;

/// Número máximo de domínios NUMA
pub const MAXMEMDOM: usize = 8;

/// Número máximo de segmentos físicos (cabe na máscara de 64 bits do domínio)
pub const PHYSSEG_MAX: usize = 63;

/// Abaixo disto: free list LowMem (dispositivos ISA de 24 bits)
pub const LOWMEM_BOUNDARY: u64 = 16 * 1024 * 1024;

/// Abaixo disto: free list Dma32 (dispositivos de 32 bits)
pub const DMA32_BOUNDARY: u64 = 4 * 1024 * 1024 * 1024;

// =============================================================================
// RECLAIM
// =============================================================================

/// Passadas consecutivas sem progresso antes de um domínio votar por OOM
pub const OOM_SEQ_DEFAULT: u32 = 12;

// =============================================================================
// CONFIGURAÇÃO SMP
// =============================================================================

/// Número máximo de CPUs suportadas (shards por contador)
pub const MAX_CPUS: usize = 64;

const _: () = assert!(PHYSSEG_MAX < 64);
const _: () = assert!(MAXMEMDOM <= u8::MAX as usize);

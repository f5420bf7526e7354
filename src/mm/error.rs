//! Tipos de Erro do Subsistema de Memória
//!
//! Exaustão no caminho quente é `None`/`false`; este tipo cobre operações com
//! mais de uma causa de falha.

/// Erros do subsistema de memória
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// Sem memória disponível (alocação que não pode esperar)
    OutOfMemory,
    /// Região já registrada (segmento real ou range fictício)
    AlreadyMapped,
    /// Endereço não alinhado a página
    NotAligned,
    /// Tamanho inválido (zero ou range invertido)
    InvalidSize,
    /// Parâmetro inválido
    InvalidParameter,
}

impl MmError {
    /// Retorna descrição legível do erro
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "OOM: sem memória disponível",
            Self::AlreadyMapped => "Região já registrada",
            Self::NotAligned => "Endereço não alinhado a página",
            Self::InvalidSize => "Tamanho inválido",
            Self::InvalidParameter => "Parâmetro inválido",
        }
    }
}

impl core::fmt::Display for MmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tipo Result específico para operações de memória
pub type MmResult<T> = Result<T, MmError>;

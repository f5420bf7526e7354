//! Lista duplamente encadeada por índice.
//!
//! Os nós não pertencem à lista: vivem em uma arena (o array de descritores
//! de página) e cada elemento carrega seus próprios campos `prev`/`next`.
//! A lista guarda apenas cabeça, cauda e contagem.
//!
//! Os links são atômicos apenas para permitir mutabilidade interior através
//! de `&[T]`. Toda mutação acontece com o lock do dono da lista adquirido.

use core::sync::atomic::{AtomicU32, Ordering};

/// Índice "nulo"
pub const NIL: u32 = u32::MAX;

/// Campos de encadeamento embutidos no elemento
#[derive(Debug)]
pub struct Links {
    prev: AtomicU32,
    next: AtomicU32,
}

impl Links {
    pub const fn new() -> Self {
        Self {
            prev: AtomicU32::new(NIL),
            next: AtomicU32::new(NIL),
        }
    }

    #[inline]
    fn prev(&self) -> u32 {
        self.prev.load(Ordering::Relaxed)
    }

    #[inline]
    fn next(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }

    #[inline]
    fn set(&self, prev: u32, next: u32) {
        self.prev.store(prev, Ordering::Relaxed);
        self.next.store(next, Ordering::Relaxed);
    }
}

impl Default for Links {
    fn default() -> Self {
        Self::new()
    }
}

/// Elemento encadeável
pub trait Linked {
    fn links(&self) -> &Links;
}

/// Cabeça de lista sobre uma arena de `T: Linked`
#[derive(Debug)]
pub struct IndexList {
    head: u32,
    tail: u32,
    len: usize,
}

impl IndexList {
    pub const fn new() -> Self {
        Self {
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Primeiro elemento
    #[inline]
    pub fn first(&self) -> Option<u32> {
        (self.head != NIL).then_some(self.head)
    }

    /// Último elemento
    #[inline]
    pub fn last(&self) -> Option<u32> {
        (self.tail != NIL).then_some(self.tail)
    }

    /// Sucessor de `id` (que deve estar nesta lista)
    #[inline]
    pub fn next<T: Linked>(&self, arena: &[T], id: u32) -> Option<u32> {
        let next = arena[id as usize].links().next();
        (next != NIL).then_some(next)
    }

    /// Insere no final
    pub fn push_back<T: Linked>(&mut self, arena: &[T], id: u32) {
        let links = arena[id as usize].links();
        links.set(self.tail, NIL);

        if self.tail == NIL {
            self.head = id;
        } else {
            arena[self.tail as usize].links().next.store(id, Ordering::Relaxed);
        }
        self.tail = id;
        self.len += 1;
    }

    /// Insere no início
    pub fn push_front<T: Linked>(&mut self, arena: &[T], id: u32) {
        let links = arena[id as usize].links();
        links.set(NIL, self.head);

        if self.head == NIL {
            self.tail = id;
        } else {
            arena[self.head as usize].links().prev.store(id, Ordering::Relaxed);
        }
        self.head = id;
        self.len += 1;
    }

    /// Insere `id` logo após `anchor` (que deve estar nesta lista)
    pub fn insert_after<T: Linked>(&mut self, arena: &[T], anchor: u32, id: u32) {
        let next = arena[anchor as usize].links().next();
        arena[id as usize].links().set(anchor, next);
        arena[anchor as usize].links().next.store(id, Ordering::Relaxed);

        if next == NIL {
            self.tail = id;
        } else {
            arena[next as usize].links().prev.store(id, Ordering::Relaxed);
        }
        self.len += 1;
    }

    /// Insere `id` logo antes de `anchor` (que deve estar nesta lista)
    pub fn insert_before<T: Linked>(&mut self, arena: &[T], anchor: u32, id: u32) {
        let prev = arena[anchor as usize].links().prev();
        arena[id as usize].links().set(prev, anchor);
        arena[anchor as usize].links().prev.store(id, Ordering::Relaxed);

        if prev == NIL {
            self.head = id;
        } else {
            arena[prev as usize].links().next.store(id, Ordering::Relaxed);
        }
        self.len += 1;
    }

    /// Remove `id` (que deve estar nesta lista)
    pub fn remove<T: Linked>(&mut self, arena: &[T], id: u32) {
        debug_assert!(self.len > 0, "remoção em lista vazia");

        let links = arena[id as usize].links();
        let (prev, next) = (links.prev(), links.next());

        if prev == NIL {
            debug_assert_eq!(self.head, id);
            self.head = next;
        } else {
            arena[prev as usize].links().next.store(next, Ordering::Relaxed);
        }

        if next == NIL {
            debug_assert_eq!(self.tail, id);
            self.tail = prev;
        } else {
            arena[next as usize].links().prev.store(prev, Ordering::Relaxed);
        }

        links.set(NIL, NIL);
        self.len -= 1;
    }

    /// Remove o primeiro elemento
    pub fn pop_front<T: Linked>(&mut self, arena: &[T]) -> Option<u32> {
        let id = self.first()?;
        self.remove(arena, id);
        Some(id)
    }

    /// Itera do início ao fim
    pub fn iter<'a, T: Linked>(&'a self, arena: &'a [T]) -> Iter<'a, T> {
        Iter {
            arena,
            cursor: self.head,
        }
    }
}

impl Default for IndexList {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a, T> {
    arena: &'a [T],
    cursor: u32,
}

impl<T: Linked> Iterator for Iter<'_, T> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.cursor == NIL {
            return None;
        }
        let id = self.cursor;
        self.cursor = self.arena[id as usize].links().next();
        Some(id)
    }
}

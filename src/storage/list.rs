//! Write-Order List
//!
//! A doubly-linked list stored in a `Vec` arena. Nodes are addressed by
//! [`Slot`] indices instead of pointers, which keeps the structure free of
//! `unsafe` while still giving O(1):
//!
//! - push to the tail (newest write)
//! - pop from the head (oldest write)
//! - move an existing node to the tail
//! - unlink an arbitrary node by slot
//!
//! ```text
//!   head (oldest)                                   tail (newest)
//!   ┌──────┐     ┌──────┐     ┌──────┐     ┌──────┐
//!   │ slot │ <─> │ slot │ <─> │ slot │ <─> │ slot │
//!   └──────┘     └──────┘     └──────┘     └──────┘
//! ```
//!
//! Freed slots are recycled. A slot held past the removal of its node may
//! therefore point at a different item later on; callers that keep slots
//! around must validate what they find there.

/// Index of a node inside the arena.
pub type Slot = usize;

#[derive(Debug)]
struct Node<T> {
    item: T,
    prev: Option<Slot>,
    next: Option<Slot>,
}

/// Arena-backed doubly-linked list ordered by insertion/move time.
#[derive(Debug)]
pub struct WriteOrderList<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<Slot>,
    head: Option<Slot>,
    tail: Option<Slot>,
    len: usize,
}

impl<T> Default for WriteOrderList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WriteOrderList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Creates an empty list with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    #[inline]
    fn node(&self, slot: Slot) -> Option<&Node<T>> {
        self.nodes.get(slot).and_then(Option::as_ref)
    }

    #[inline]
    fn node_mut(&mut self, slot: Slot) -> Option<&mut Node<T>> {
        self.nodes.get_mut(slot).and_then(Option::as_mut)
    }

    /// Detaches a node from its neighbours without freeing its slot.
    fn unlink(&mut self, slot: Slot) {
        let Some((prev, next)) = self.node(slot).map(|n| (n.prev, n.next)) else {
            return;
        };

        match prev.and_then(|p| self.node_mut(p)) {
            Some(p) => p.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.node_mut(n)) {
            Some(n) => n.prev = prev,
            None => self.tail = prev,
        }
    }

    /// Attaches a detached node at the tail.
    fn link_back(&mut self, slot: Slot) {
        let old_tail = self.tail;
        if let Some(node) = self.node_mut(slot) {
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail.and_then(|t| self.node_mut(t)) {
            Some(t) => t.next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }

    /// Appends an item at the tail and returns its slot.
    pub fn push_back(&mut self, item: T) -> Slot {
        let node = Node {
            item,
            prev: None,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.link_back(slot);
        self.len += 1;
        slot
    }

    /// Moves an existing node to the tail.
    ///
    /// Returns `false` if the slot is empty.
    pub fn move_to_back(&mut self, slot: Slot) -> bool {
        if self.node(slot).is_none() {
            return false;
        }
        if self.tail != Some(slot) {
            self.unlink(slot);
            self.link_back(slot);
        }
        true
    }

    /// Unlinks and returns the item at `slot`, freeing the slot.
    pub fn remove(&mut self, slot: Slot) -> Option<T> {
        self.node(slot)?;
        self.unlink(slot);
        let node = self.nodes.get_mut(slot)?.take()?;
        self.free.push(slot);
        self.len -= 1;
        Some(node.item)
    }

    /// Removes and returns the oldest item.
    pub fn pop_front(&mut self) -> Option<T> {
        let head = self.head?;
        self.remove(head)
    }

    pub fn get(&self, slot: Slot) -> Option<&T> {
        self.node(slot).map(|n| &n.item)
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut T> {
        self.node_mut(slot).map(|n| &mut n.item)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Drops every item and releases the arena's memory.
    pub fn clear(&mut self) {
        self.nodes = Vec::new();
        self.free = Vec::new();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Iterates from the oldest to the newest item.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            next: self.head,
        }
    }
}

/// Oldest-to-newest iterator over a [`WriteOrderList`].
pub struct Iter<'a, T> {
    list: &'a WriteOrderList<T>,
    next: Option<Slot>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Slot, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.next?;
        let node = self.list.node(slot)?;
        self.next = node.next;
        Some((slot, &node.item))
    }
}

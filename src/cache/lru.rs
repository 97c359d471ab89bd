//! LRU List Module
//!
//! Implements Least Recently Used ordering for cache eviction.

// == Slot Handle ==
/// Stable position of an item inside an [`LruList`].
///
/// Handles stay valid until the item is removed; the slot may then be reused.
pub type Handle = usize;

#[derive(Debug)]
struct Node<T> {
    item: T,
    prev: Option<Handle>,
    next: Option<Handle>,
}

// == LRU List ==
/// Recency order backed by a slab of doubly linked nodes.
///
/// - Front = Most recently used
/// - Back = Least recently used
///
/// Every operation is O(1). Freed slots are recycled through a free list.
#[derive(Debug)]
pub struct LruList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<Handle>,
    head: Option<Handle>,
    tail: Option<Handle>,
    len: usize,
}

impl<T> Default for LruList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LruList<T> {
    // == Constructor ==
    /// Creates a new empty LRU list.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Creates an empty list with room for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    // == Push Front ==
    /// Inserts an item as the most recently used and returns its handle.
    pub fn push_front(&mut self, item: T) -> Handle {
        let node = Node {
            item,
            prev: None,
            next: self.head,
        };

        let handle = match self.free.pop() {
            Some(handle) => {
                self.slots[handle] = Some(node);
                handle
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        if let Some(old_head) = self.head {
            self.node_mut(old_head).prev = Some(handle);
        }
        self.head = Some(handle);
        if self.tail.is_none() {
            self.tail = Some(handle);
        }
        self.len += 1;
        handle
    }

    // == Touch ==
    /// Marks an item as recently used (moves to front).
    pub fn touch(&mut self, handle: Handle) {
        if self.head == Some(handle) || !self.contains(handle) {
            return;
        }
        self.unlink(handle);

        let old_head = self.head;
        {
            let node = self.node_mut(handle);
            node.prev = None;
            node.next = old_head;
        }
        if let Some(old_head) = old_head {
            self.node_mut(old_head).prev = Some(handle);
        }
        self.head = Some(handle);
        if self.tail.is_none() {
            self.tail = Some(handle);
        }
    }

    // == Remove ==
    /// Removes an item from the list, returning it.
    ///
    /// Returns None if the handle is not occupied.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        if !self.contains(handle) {
            return None;
        }
        self.unlink(handle);
        let node = self.slots[handle].take()?;
        self.free.push(handle);
        self.len -= 1;
        Some(node.item)
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used item.
    ///
    /// Returns None if the list is empty.
    pub fn evict_oldest(&mut self) -> Option<(Handle, T)> {
        let tail = self.tail?;
        self.remove(tail).map(|item| (tail, item))
    }

    // == Peek Oldest ==
    /// Returns the least recently used item without removing it.
    pub fn peek_oldest(&self) -> Option<&T> {
        self.tail.and_then(|handle| self.get(handle))
    }

    /// Returns the most recently used item.
    pub fn peek_newest(&self) -> Option<&T> {
        self.head.and_then(|handle| self.get(handle))
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots
            .get(handle)
            .and_then(Option::as_ref)
            .map(|node| &node.item)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots
            .get_mut(handle)
            .and_then(Option::as_mut)
            .map(|node| &mut node.item)
    }

    // == Iteration ==
    /// Iterates items from most to least recently used.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Handles from most to least recently used.
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(handle) = cursor {
            handles.push(handle);
            cursor = self.slots[handle].as_ref().and_then(|node| node.next);
        }
        handles
    }

    // == Length ==
    /// Returns the number of tracked items.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Checks if a handle currently holds an item.
    pub fn contains(&self, handle: Handle) -> bool {
        matches!(self.slots.get(handle), Some(Some(_)))
    }

    fn node_mut(&mut self, handle: Handle) -> &mut Node<T> {
        self.slots[handle]
            .as_mut()
            .unwrap_or_else(|| unreachable!("linked handle {handle} points at a free slot"))
    }

    /// Detaches a node from its neighbours without freeing its slot.
    fn unlink(&mut self, handle: Handle) {
        let (prev, next) = {
            let node = self.node_mut(handle);
            (node.prev.take(), node.next.take())
        };

        match prev {
            Some(prev) => self.node_mut(prev).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.node_mut(next).prev = prev,
            None => self.tail = prev,
        }
    }
}

// == Iterator ==
pub struct Iter<'a, T> {
    list: &'a LruList<T>,
    cursor: Option<Handle>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let node = self.list.slots[handle].as_ref()?;
        self.cursor = node.next;
        Some(&node.item)
    }
}

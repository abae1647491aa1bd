//! Offset-based paging over the pair's history.
//!
//! Pages are cut newest-first and handed back oldest-first, so each page reads
//! as a transcript fragment and offset 0 is always the most recent window.
//! Offsets are not stable under concurrent inserts: a message created between
//! two fetches shifts every older window by one. Clients that backfill by
//! offset may therefore see a message twice across pages and must merge by id.

use pairchat_types::models::Message;
use uuid::Uuid;

use crate::{MessageStore, Result};

/// Hard ceiling on page size regardless of what the client asks for.
pub const MAX_PAGE_LIMIT: usize = 50;

pub const DEFAULT_PAGE_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

/// Missing or zero means the default; anything above the ceiling is clamped.
pub fn clamp_limit(requested: Option<usize>) -> usize {
    match requested {
        None | Some(0) => DEFAULT_PAGE_LIMIT,
        Some(n) => n.min(MAX_PAGE_LIMIT),
    }
}

impl MessageStore {
    /// Messages `[offset, offset + limit)` counted from the newest, returned
    /// oldest-first. `limit` is clamped with [`clamp_limit`].
    pub fn page(&self, a: Uuid, b: Uuid, limit: usize, offset: usize) -> Result<Page> {
        let limit = clamp_limit(Some(limit));

        self.with_state(|state| {
            let total = state.rows_between(a, b).count();
            let mut messages: Vec<Message> = state
                .rows_between(a, b)
                .rev()
                .skip(offset)
                .take(limit)
                .map(|row| state.canonical(row))
                .collect();
            messages.reverse();

            Ok(Page {
                messages,
                has_more: offset.saturating_add(limit) < total,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pairchat_types::models::NewMessage;

    use crate::test_support::*;
    use super::*;

    fn seed(store: &MessageStore, n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                store
                    .create_message(
                        alice(),
                        NewMessage {
                            content: format!("m{}", i),
                            receiver_id: bob(),
                            ..Default::default()
                        },
                    )
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_PAGE_LIMIT);
        assert_eq!(clamp_limit(Some(0)), DEFAULT_PAGE_LIMIT);
        assert_eq!(clamp_limit(Some(10)), 10);
        assert_eq!(clamp_limit(Some(500)), MAX_PAGE_LIMIT);
    }

    #[test]
    fn test_first_page_is_newest_oldest_first() {
        let store = store();
        seed(&store, 25);

        let page = store.page(alice(), bob(), 10, 0).unwrap();
        let contents: Vec<_> = page.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents.first(), Some(&"m15"));
        assert_eq!(contents.last(), Some(&"m24"));
        assert!(page.has_more);
    }

    #[test]
    fn test_pages_cover_history_exactly_once() {
        for (n, limit) in [(0, 5), (1, 5), (10, 5), (23, 5), (7, 50), (120, 50)] {
            let store = store();
            seed(&store, n);

            let mut seen = HashSet::new();
            let mut offset = 0;
            loop {
                let page = store.page(alice(), bob(), limit, offset).unwrap();
                for m in &page.messages {
                    assert!(seen.insert(m.id), "message {} returned twice", m.id);
                }
                offset += limit;
                if !page.has_more {
                    assert!(offset >= n);
                    break;
                }
                assert!(offset < n);
            }
            assert_eq!(seen.len(), n);
        }
    }

    #[test]
    fn test_limit_is_clamped() {
        let store = store();
        seed(&store, 60);
        let page = store.page(alice(), bob(), 1000, 0).unwrap();
        assert_eq!(page.messages.len(), MAX_PAGE_LIMIT);
        assert!(page.has_more);

        let rest = store.page(alice(), bob(), 1000, MAX_PAGE_LIMIT).unwrap();
        assert_eq!(rest.messages.len(), 10);
        assert!(!rest.has_more);
    }

    #[test]
    fn test_offset_past_end() {
        let store = store();
        seed(&store, 3);
        let page = store.page(alice(), bob(), 10, 10).unwrap();
        assert!(page.messages.is_empty());
        assert!(!page.has_more);
    }
}

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::collections::HashSet;
use std::time::Instant;
use ticketdesk_core::store::TicketStore;

// Newline-separated payloads applied in order must never leave two cached
// tickets with the same id.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut store = TicketStore::new();
    let now = Instant::now();
    for line in text.lines() {
        if let Ok(payload) = serde_json::from_str::<serde_json::Value>(line) {
            store.apply_change(&payload, now);
        }
    }
    let mut seen = HashSet::new();
    for ticket in store.tickets() {
        assert!(seen.insert(ticket.id), "duplicate id {}", ticket.id);
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use ticketdesk_core::realtime::ChangeNotification;

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    if let Ok(notification) = ChangeNotification::from_payload(&payload) {
        // A normalized notification always names a row.
        let _ = notification.id();
        let _ = notification.kind();
    }
});

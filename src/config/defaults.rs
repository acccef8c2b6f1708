//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// [template] Section Defaults
// ============================================================================

pub mod template {
    pub fn separator() -> String {
        "|".into()
    }
}

// ============================================================================
// [ssr] Section Defaults
// ============================================================================

pub mod ssr {
    pub fn payload_id() -> String {
        "head:payload".into()
    }

    pub fn hash_attribute() -> String {
        "data-head-hash".into()
    }
}

// ============================================================================
// [client] Section Defaults
// ============================================================================

pub mod client {
    pub fn debounce_ms() -> u64 {
        0
    }
}

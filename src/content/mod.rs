//! Article content presentation: deciding whether a page may be embedded.

mod embed;

pub use embed::{
    check_embeddable, evaluate_headers, probe_url, EmbedCheck, EmbedError, REASON_CSP,
    REASON_UNVERIFIED, REASON_X_FRAME_OPTIONS,
};

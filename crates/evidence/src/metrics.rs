use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

pub static EVIDENCE_PENDING: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "tessera_evidence_pending",
        "Pending evidence currently in the pool"
    )
    .unwrap()
});

pub static EVIDENCE_ADDED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tessera_evidence_added_total",
        "Evidence admitted to the pending set"
    )
    .unwrap()
});

pub static EVIDENCE_COMMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tessera_evidence_committed_total",
        "Pending evidence promoted to committed"
    )
    .unwrap()
});

pub static EVIDENCE_EXPIRED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tessera_evidence_expired_total",
        "Pending evidence discarded by the expiry sweep"
    )
    .unwrap()
});

pub fn set_pending(n: u32) {
    EVIDENCE_PENDING.set(n as i64);
}

pub fn inc_added() {
    EVIDENCE_ADDED_TOTAL.inc();
}

pub fn inc_committed(n: u64) {
    EVIDENCE_COMMITTED_TOTAL.inc_by(n);
}

pub fn inc_expired(n: u64) {
    EVIDENCE_EXPIRED_TOTAL.inc_by(n);
}

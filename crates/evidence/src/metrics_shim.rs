// No-op stand-ins so call sites stay unconditional when the `metrics`
// feature is off.

#[inline]
pub fn set_pending(_n: u32) {}

#[inline]
pub fn inc_added() {}

#[inline]
pub fn inc_committed(_n: u64) {}

#[inline]
pub fn inc_expired(_n: u64) {}

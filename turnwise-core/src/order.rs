// Final ordering pass

use crate::types::CanonicalMessage;

/// Stable sort by timestamp ascending; ties keep their input order
pub fn order_by_timestamp(messages: &mut [CanonicalMessage]) {
    messages.sort_by_key(|message| message.timestamp);
}

pub fn is_chronological(messages: &[CanonicalMessage]) -> bool {
    messages.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp)
}

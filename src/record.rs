//! Record layout: `key bytes ‖ payload`. There is no length prefix; the store
//! knows where a record ends, and the key length is known to whoever asks.

pub fn encode(key: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(key.len() + payload.len());
    record.extend_from_slice(key);
    record.extend_from_slice(payload);
    record
}

/// True when `candidate` was written for `key`. A checksum hit that fails
/// this is a collision and is handled as a miss.
pub fn verify(candidate: &[u8], key: &[u8]) -> bool {
    if candidate.len() < key.len() {
        return false;
    }
    candidate[..key.len()] == *key
}

pub fn payload_of<'a>(candidate: &'a [u8], key: &[u8]) -> &'a [u8] {
    &candidate[key.len().min(candidate.len())..]
}

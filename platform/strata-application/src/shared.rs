use sha2::{Digest, Sha256};
use strata_domain::value_objects::params::Params;

pub(crate) fn should_cancel(hook: Option<&(dyn Fn() -> bool + Sync)>) -> bool {
    hook.map(|f| f()).unwrap_or(false)
}

/// Short stable hash of a parameter map with floats rounded, used for
/// deduplication and run ids.
pub(crate) fn params_hash(params: &Params) -> String {
    let rounded: Params = params
        .iter()
        .map(|(name, value)| (name.clone(), value.rounded()))
        .collect();
    let canonical = serde_json::to_string(&rounded).unwrap_or_else(|_| "{\"error\":\"params\"}".to_string());
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let bytes = hasher.finalize();
    to_hex_short(&bytes[..], 16)
}

pub(crate) fn to_hex_short(bytes: &[u8], chars: usize) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(chars);
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        if out.len() >= chars {
            break;
        }
        out.push(HEX[(b & 0x0f) as usize] as char);
        if out.len() >= chars {
            break;
        }
    }
    out
}

pub(crate) fn ts_rfc3339(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_domain::value_objects::params::ParamValue;

    #[test]
    fn params_hash_ignores_float_noise() {
        let mut a = Params::new();
        a.insert("x".to_string(), ParamValue::Float(0.1 + 0.2));
        let mut b = Params::new();
        b.insert("x".to_string(), ParamValue::Float(0.3));
        assert_eq!(params_hash(&a), params_hash(&b));
        assert_eq!(params_hash(&a).len(), 16);

        b.insert("x".to_string(), ParamValue::Float(0.300002));
        assert_ne!(params_hash(&a), params_hash(&b));
    }

    #[test]
    fn rfc3339_formats_epoch_millis() {
        assert_eq!(ts_rfc3339(0), "1970-01-01T00:00:00+00:00");
    }
}

//! Endpoint ID minting.

use rand::Rng;
use rand::distr::Alphanumeric;
use skirmish_protocol::EndpointId;

/// Length of the random suffix.
const SUFFIX_LEN: usize = 8;

/// UTC timestamp prefix, e.g. `20250101120000`.
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Mints a fresh endpoint ID: `<YYYYMMDDHHMMSS>-<8 random alphanumerics>`.
pub fn mint_endpoint_id() -> EndpointId {
    let timestamp = chrono::Utc::now().format(TIMESTAMP_FORMAT);
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    EndpointId::new(format!("{timestamp}-{suffix}"))
}

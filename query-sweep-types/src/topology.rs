use custom_float::PositiveNonZeroF64;

/// Parse the two Waxman model constants out of a topology identifier of
/// the form `waxman_<alpha>_<beta>`. Each token is the constant's digits
/// with the leading "0." dropped: "02" -> 0.2, "015" -> 0.15.
///
/// Topology identifiers stay opaque to the sweep itself; the parsed
/// constants are recorded for bookkeeping only, so unknown shapes yield
/// `None` rather than an error.
pub fn waxman_params(id: &str) -> Option<(PositiveNonZeroF64, PositiveNonZeroF64)> {
    let rest = id.strip_prefix("waxman_")?;
    let (alpha, beta) = rest.split_once('_')?;
    Some((decimal_token(alpha)?, decimal_token(beta)?))
}

fn decimal_token(tok: &str) -> Option<PositiveNonZeroF64> {
    if tok.is_empty() || !tok.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits: u64 = tok.parse().ok()?;
    let scale = 10u64.pow(tok.len() as u32 - 1);
    PositiveNonZeroF64::try_new(digits as f64 / scale as f64).ok()
}

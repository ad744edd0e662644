use tracing::debug;

use super::types::{CalculatedDs, DsRecord, Matching};

/// Pair published DS records with the recomputed ones.
///
/// For every published DS, every calculated DS with the same digest type and
/// digest is a match; the matched key is the one that produced that digest.
/// No match at all is a valid outcome (broken or absent chain), not an
/// error.
pub fn match_chain(published: &[DsRecord], calculated: &[CalculatedDs]) -> Matching {
    let mut matching = Matching::default();
    for ds in published {
        for candidate in calculated {
            if ds.same_digest(&candidate.ds) {
                debug!(key_tag = candidate.ds.key_tag, digest_type = ds.digest_type, "DS matches DNSKEY");
                let mut dnskey = candidate.dnskey.clone();
                dnskey.calculated_ds = Some(candidate.ds.clone());
                matching.push(candidate.ds.clone(), dnskey);
            }
        }
    }
    matching
}
